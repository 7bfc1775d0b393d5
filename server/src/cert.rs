//! Self-signed certificate for the optional HTTPS listener

use anyhow::{Context, Result};
use rcgen::{CertificateParams, DnType, Ia5String, KeyPair, SanType};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::TlsConfig;

const CERT_COMMON_NAME: &str = "MediBook Local Server";
const CERT_ORG_NAME: &str = "MediBook";

/// Resolved certificate and key locations
#[derive(Debug, Clone)]
pub struct CertPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Make sure a certificate/key pair exists under `base_path`, generating a
/// self-signed one for localhost when either file is missing
pub fn ensure_certificate(config: &TlsConfig, base_path: &Path) -> Result<CertPaths> {
    let paths = CertPaths {
        cert: base_path.join(&config.cert_path),
        key: base_path.join(&config.key_path),
    };

    if paths.cert.exists() && paths.key.exists() {
        tracing::info!(cert = ?paths.cert, "Certificate files found");
        return Ok(paths);
    }

    tracing::info!("Certificate not found, generating new self-signed certificate");

    for parent in [paths.cert.parent(), paths.key.parent()].into_iter().flatten() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create certificate directory: {:?}", parent))?;
    }

    let (cert_pem, key_pem) = generate_self_signed_cert(config.validity_days)?;

    fs::write(&paths.cert, &cert_pem)
        .with_context(|| format!("Failed to write certificate to {:?}", paths.cert))?;
    fs::write(&paths.key, &key_pem)
        .with_context(|| format!("Failed to write private key to {:?}", paths.key))?;

    tracing::info!(cert = ?paths.cert, key = ?paths.key, "Certificate files written");
    Ok(paths)
}

/// Certificate for localhost, 127.0.0.1 and ::1; returns (certificate PEM, key PEM)
fn generate_self_signed_cert(validity_days: u32) -> Result<(String, String)> {
    let key_pair = KeyPair::generate().context("Failed to generate key pair")?;

    let mut params = CertificateParams::default();
    params
        .distinguished_name
        .push(DnType::CommonName, CERT_COMMON_NAME);
    params
        .distinguished_name
        .push(DnType::OrganizationName, CERT_ORG_NAME);

    let localhost_dns =
        Ia5String::try_from("localhost").context("Failed to create Ia5String for localhost")?;
    params.subject_alt_names = vec![
        SanType::DnsName(localhost_dns),
        SanType::IpAddress(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST)),
        SanType::IpAddress(std::net::IpAddr::V6(std::net::Ipv6Addr::LOCALHOST)),
    ];

    // rcgen takes `time` types
    let not_before = time::OffsetDateTime::now_utc();
    params.not_before = not_before;
    params.not_after = not_before + time::Duration::days(i64::from(validity_days));

    let cert = params
        .self_signed(&key_pair)
        .context("Failed to generate self-signed certificate")?;

    tracing::info!(validity_days, "Generated self-signed certificate");
    Ok((cert.pem(), key_pair.serialize_pem()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tls_config() -> TlsConfig {
        TlsConfig {
            enabled: true,
            cert_path: "certs/server.pem".to_string(),
            key_path: "certs/server-key.pem".to_string(),
            validity_days: 30,
        }
    }

    #[test]
    fn test_generates_missing_certificate() {
        let dir = TempDir::new().unwrap();

        let paths = ensure_certificate(&tls_config(), dir.path()).unwrap();

        let cert = fs::read_to_string(&paths.cert).unwrap();
        let key = fs::read_to_string(&paths.key).unwrap();
        assert!(cert.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(key.contains("PRIVATE KEY"));
    }

    #[test]
    fn test_existing_certificate_is_kept() {
        let dir = TempDir::new().unwrap();
        let first = ensure_certificate(&tls_config(), dir.path()).unwrap();
        let original = fs::read_to_string(&first.cert).unwrap();

        let second = ensure_certificate(&tls_config(), dir.path()).unwrap();

        assert_eq!(fs::read_to_string(&second.cert).unwrap(), original);
    }
}
