use serde::{Deserialize, Serialize};

use super::Context;

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DeleteOutcome {
    Deleted { success: bool, id: String },
    Failed { success: bool, error: String },
}

/// Delete one item. A failed delete is reported in the output, not as an error.
pub async fn delete(ctx: &Context, params: DeleteParams) -> DeleteOutcome {
    match ctx.memory.delete_memory_item(&params.id).await {
        Ok(()) => {
            tracing::info!(id = %params.id, "memory deleted");
            DeleteOutcome::Deleted {
                success: true,
                id: params.id,
            }
        }
        Err(e) => DeleteOutcome::Failed {
            success: false,
            error: format!("{e:#}"),
        },
    }
}
