//! `memorize`: run the full pipeline, falling back to a context store.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::store::{self, StoreOutcome, StoreParams};
use super::Context;
use crate::memory::types::{MemoryType, Modality};

const FALLBACK_VISION_PROMPT: &str = "Describe this image concisely.";

#[derive(Debug, Deserialize)]
pub struct MemorizeParams {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_modality")]
    pub modality: String,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Caller-supplied description, e.g. "This is the user's dog Moka".
    #[serde(default)]
    pub context: Option<String>,
}

fn default_modality() -> String {
    Modality::Text.as_str().to_string()
}

#[derive(Debug, Serialize)]
pub struct MemorizeOutput {
    pub success: bool,
    pub resource_id: Option<String>,
    pub items_created: usize,
    pub items: Vec<MemorizedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct MemorizedItem {
    pub id: String,
    pub summary: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
}

pub async fn memorize(ctx: &Context, params: MemorizeParams) -> Result<MemorizeOutput> {
    let modality = params.modality.parse::<Modality>();
    let is_image = modality == Ok(Modality::Image);

    let pipeline = match modality {
        Ok(modality) => {
            ctx.memory
                .memorize(&params.url, modality, params.user_id.as_deref())
                .await
        }
        Err(e) => Err(anyhow::Error::msg(e)),
    };
    let (resource_id, items) = match pipeline {
        Ok(result) => (Some(result.resource.id), result.items),
        Err(e) => {
            tracing::warn!(url = %params.url, error = %format!("{e:#}"), "memorize pipeline failed");
            (None, Vec::new())
        }
    };

    if items.is_empty() && (params.context.is_some() || is_image) {
        if let Some(item) = context_fallback(ctx, &params, is_image).await? {
            return Ok(MemorizeOutput {
                success: true,
                resource_id,
                items_created: 1,
                items: vec![item],
                fallback: Some("context_store"),
            });
        }
    }

    Ok(MemorizeOutput {
        success: true,
        resource_id,
        items_created: items.len(),
        items: items
            .into_iter()
            .map(|item| MemorizedItem {
                id: item.id,
                summary: item.summary,
                memory_type: item.memory_type,
            })
            .collect(),
        fallback: None,
    })
}

/// Store the caller's context, plus a vision caption for images, as one event.
async fn context_fallback(
    ctx: &Context,
    params: &MemorizeParams,
    is_image: bool,
) -> Result<Option<MemorizedItem>> {
    let description = if is_image {
        match ctx.llm.vision(FALLBACK_VISION_PROMPT, &params.url, None).await {
            Ok(d) => d.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "fallback image description failed");
                String::new()
            }
        }
    } else {
        String::new()
    };

    let content = fallback_content(params.context.as_deref(), &description);
    if content.is_empty() {
        return Ok(None);
    }

    let outcome = store::store(
        ctx,
        StoreParams {
            content,
            memory_type: Some(MemoryType::Event.as_str().to_string()),
            categories: Some(vec!["Facts".to_string()]),
            skip_judge: false,
        },
    )
    .await?;

    Ok(match outcome {
        StoreOutcome::Stored { id, summary, .. } => Some(MemorizedItem {
            id,
            summary,
            memory_type: MemoryType::Event,
        }),
        _ => None,
    })
}

fn fallback_content(context: Option<&str>, description: &str) -> String {
    let mut lines = Vec::new();
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        lines.push(format!("Context: {context}"));
    }
    if !description.is_empty() {
        lines.push(format!("Image description: {description}"));
    }
    lines.join("\n")
}
