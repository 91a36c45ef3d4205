//! Error propagation along the ancestor chain.

use crate::error::{CapturedError, ErrorInfo};
use crate::options::DiagnosticHooks;
use crate::vnode::VNodeRef;

/// Walks outward from `origin` looking for an instance that reacts to `error`
/// by scheduling a re-render. That instance becomes the active boundary and
/// the error is absorbed. A recovery callback that throws replaces the error
/// and the walk continues from its parent. `Err` carries the error no
/// ancestor handled.
pub(crate) fn propagate(
    error: CapturedError,
    origin: &VNodeRef,
    hooks: &DiagnosticHooks,
) -> Result<(), CapturedError> {
    let info = ErrorInfo {
        component_stack: origin.component_stack(),
    };
    hooks.caught(&error, &info);
    log::debug!("propagating {error}\n{info}");

    let mut error = error;
    let mut cursor = origin.parent();
    while let Some(node) = cursor {
        if let Some(instance) = node.instance.as_ref() {
            if !instance.is_processing_exception() && !instance.is_unmounted() {
                match instance.handle_error(&error, &info) {
                    Ok(true) => {
                        log::debug!("<{}> handles {error}", instance.name);
                        instance.mark_pending_error();
                        return Ok(());
                    }
                    Ok(false) => {}
                    Err(replaced) => {
                        log::debug!("<{}> failed while handling {error}: {replaced}", instance.name);
                        error = replaced;
                    }
                }
            }
        }
        cursor = node.parent();
    }
    Err(error)
}
