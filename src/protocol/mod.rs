/*!
 * Storage protocols
 *
 * Supports:
 * - S3 and S3-compatible object stores (MinIO, Ceph RGW, ...)
 */

pub mod s3;
