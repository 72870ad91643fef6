//! Platform permission seam

/// Request code used when no configuration overrides it. Each view adds its
/// id so concurrent views never see each other's answers.
pub const DEFAULT_REQUEST_CODE_BASE: i32 = 513_469_796;

/// Request code for a view
pub fn request_code(base: i32, view_id: i32) -> i32 {
    base.wrapping_add(view_id)
}

/// Runtime camera permission API of the host platform.
///
/// `request` only shows the prompt; the answer arrives later through the
/// view registry as a `(request_code, grants)` callback.
pub trait PermissionPlatform: Send + Sync {
    /// Whether the platform asks the user at runtime at all
    fn requires_runtime_request(&self) -> bool;

    fn is_granted(&self) -> bool;

    fn request(&self, request_code: i32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_code_per_view() {
        assert_eq!(request_code(DEFAULT_REQUEST_CODE_BASE, 0), 513469796);
        assert_eq!(request_code(DEFAULT_REQUEST_CODE_BASE, 3), 513469799);
        assert_eq!(request_code(i32::MAX, 1), i32::MIN);
    }
}
