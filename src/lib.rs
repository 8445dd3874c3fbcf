/*!
 * s3-transit - S3 object transfer over constrained HTTP primitives
 *
 * An S3-compatible client library with:
 * - A transport adapter from a uniform HTTP model onto a restricted platform primitive
 * - Object fetch into files (temp file + atomic rename, bounded by a deadline)
 * - Object fetch into blocking or async callbacks
 * - Paged bulk delete with per-object error reporting
 * - Structured logging via tracing
 */

pub mod logging;
pub mod protocol;
pub mod transport;

// Re-export commonly used types
pub use protocol::s3::{
    ClientConfig, DeleteError, GetObjectArgs, ObjectIdentity, ObjectStat, RemoveObjectsArgs,
    S3Client, S3Error, S3Result, StatObjectArgs,
};
pub use transport::{
    HttpTransport, PlatformClient, PlatformTransport, TransportContext, TransportError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
