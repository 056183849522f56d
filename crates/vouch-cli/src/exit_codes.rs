//! Exit codes of the `vouch` binary.
//! These codes are part of the public contract.

use vouch_core::RunError;

pub const SUCCESS: i32 = 0;
pub const RUN_FAILED: i32 = 1; // Observation, signing, timestamp or sink failure
pub const CONFIG_ERROR: i32 = 2; // Signer resolution, attestor set/options, config file
pub const PUBLISH_FAILED: i32 = 3; // Archive upload failed; local artifact was written

pub fn for_run_error(err: &RunError) -> i32 {
    match err {
        RunError::Publish(_) => PUBLISH_FAILED,
        e if e.is_config_error() => CONFIG_ERROR,
        _ => RUN_FAILED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_library_classification() {
        let errors = [
            RunError::NoSigner,
            RunError::AmbiguousSigner { count: 2 },
            RunError::InvalidConfig {
                message: "x".into(),
            },
            RunError::Signing(vouch_core::SigningError("x".into())),
            RunError::Publish(vouch_core::PublishError::Rejected {
                message: "x".into(),
            }),
        ];
        for err in &errors {
            assert_eq!(for_run_error(err), err.exit_code(), "{err}");
        }
    }
}
