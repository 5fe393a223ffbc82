use anyhow::Result;
use serde::Serialize;

use super::Context;
use crate::memory::types::MemoryCategory;

#[derive(Debug, Serialize)]
pub struct CategoriesOutput {
    pub success: bool,
    pub count: usize,
    pub categories: Vec<MemoryCategory>,
}

pub async fn categories(ctx: &Context) -> Result<CategoriesOutput> {
    let categories = ctx.memory.list_memory_categories().await?;
    Ok(CategoriesOutput {
        success: true,
        count: categories.len(),
        categories,
    })
}
