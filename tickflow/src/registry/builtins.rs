//! Built-in targets available out of the box.
//!
//! Real deployments register their own callables; these cover smoke tests
//! and demo definitions that should run without any embedding code.

use std::time::Duration;

use tracing::info;

use super::{JobContext, Registry};
use crate::inputs::ItemPayload;

/// Register the `builtin.*` targets.
pub fn install_builtins(registry: &mut Registry) {
    registry.register("builtin.noop", |_ctx| async { Ok(()) });
    registry.register("builtin.log", log_batch);
    registry.register("builtin.sleep", sleep);
}

/// Log the batch and arguments at info level.
async fn log_batch(ctx: JobContext) -> crate::Result<()> {
    for item in &ctx.batch {
        match &item.payload {
            ItemPayload::Json(value) => info!(item = %value, "batch item"),
            ItemPayload::Bytes(body) => {
                info!(item = %String::from_utf8_lossy(body), "batch item")
            }
        }
    }
    info!(
        batch_len = ctx.batch.len(),
        args = %serde_json::Value::Array(ctx.args.clone()),
        kwargs = %serde_json::Value::Object(ctx.kwargs.clone()),
        "builtin.log invoked"
    );
    Ok(())
}

/// Sleep for `ms` milliseconds (kwarg, default 1000). Useful for exercising
/// concurrency limits and attempt timeouts.
async fn sleep(ctx: JobContext) -> crate::Result<()> {
    let ms = ctx
        .kwarg("ms")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(1000);
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered() {
        let mut registry = Registry::new();
        install_builtins(&mut registry);

        assert!(registry.contains("builtin.noop"));
        assert!(registry.contains("builtin.log"));
        assert!(registry.contains("builtin.sleep"));
    }
}
