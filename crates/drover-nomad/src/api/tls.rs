//! Client TLS for `https://` Nomad addresses.
//!
//! One rustls config is shared by the reqwest client and the exec websocket,
//! so both trust the same CAs and present the same client certificate.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};

use drover_core::config::NomadTlsConfig;
use rustls::{
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
    client::{
        WebPkiServerVerifier,
        danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    },
    crypto::{CryptoProvider, ring, verify_tls12_signature, verify_tls13_signature},
    pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime},
};
use tracing::{debug, warn};

use crate::error::{NomadError, NomadResult};

/// Build the client config described by `cfg`.
///
/// Configured CAs replace the built-in web roots. TLS 1.2 is the floor.
pub(crate) fn client_config(cfg: &NomadTlsConfig) -> NomadResult<Arc<ClientConfig>> {
    let provider = Arc::new(ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
        .map_err(tls_err("protocol versions"))?;

    let verifier: Arc<dyn ServerCertVerifier> = if cfg.skip_verify {
        warn!("nomad server certificate verification is disabled");
        Arc::new(AcceptAnyServerCert { provider })
    } else {
        let roots = Arc::new(root_store(cfg)?);
        let webpki = WebPkiServerVerifier::builder_with_provider(roots, provider)
            .build()
            .map_err(|e| NomadError::Tls(format!("server verifier: {e}")))?;
        match &cfg.server_name {
            Some(name) => Arc::new(FixedServerName {
                inner: webpki,
                name: ServerName::try_from(name.clone())
                    .map_err(|e| NomadError::Tls(format!("server name {name}: {e}")))?,
            }) as Arc<dyn ServerCertVerifier>,
            None => webpki as Arc<dyn ServerCertVerifier>,
        }
    };
    let builder = builder
        .dangerous()
        .with_custom_certificate_verifier(verifier);

    let config = match (&cfg.client_cert, &cfg.client_key) {
        (Some(cert), Some(key)) => builder
            .with_client_auth_cert(load_certs(cert)?, load_key(key)?)
            .map_err(tls_err("client certificate"))?,
        _ => builder.with_no_client_auth(),
    };
    Ok(Arc::new(config))
}

fn root_store(cfg: &NomadTlsConfig) -> NomadResult<RootCertStore> {
    let mut files: Vec<PathBuf> = cfg.ca_cert.iter().cloned().collect();
    if let Some(dir) = &cfg.ca_path {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| NomadError::Tls(format!("reading {}: {e}", dir.display())))?;
        let mut found: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.is_file())
            .collect();
        found.sort();
        files.extend(found);
    }

    if files.is_empty() {
        return Ok(RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        });
    }

    let mut store = RootCertStore::empty();
    for file in &files {
        for cert in load_certs(file)? {
            store
                .add(cert)
                .map_err(|e| NomadError::Tls(format!("CA in {}: {e}", file.display())))?;
        }
    }
    debug!(count = store.len(), "loaded nomad CA certificates");
    Ok(store)
}

fn load_certs(path: &Path) -> NomadResult<Vec<CertificateDer<'static>>> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| NomadError::Tls(format!("parsing {}: {e}", path.display())))?;
    if certs.is_empty() {
        return Err(NomadError::Tls(format!("no certificates in {}", path.display())));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> NomadResult<PrivateKeyDer<'static>> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| NomadError::Tls(format!("parsing {}: {e}", path.display())))?
        .ok_or_else(|| NomadError::Tls(format!("no private key in {}", path.display())))
}

fn open(path: &Path) -> NomadResult<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| NomadError::Tls(format!("opening {}: {e}", path.display())))
}

fn tls_err(what: &'static str) -> impl Fn(rustls::Error) -> NomadError {
    move |e| NomadError::Tls(format!("{what}: {e}"))
}

/// Checks the chain against `name` instead of the host being dialled.
#[derive(Debug)]
struct FixedServerName {
    inner: Arc<WebPkiServerVerifier>,
    name: ServerName<'static>,
}

impl ServerCertVerifier for FixedServerName {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        self.inner
            .verify_server_cert(end_entity, intermediates, &self.name, ocsp_response, now)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// `skip_verify`: any chain is accepted, handshake signatures are still checked.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Self-signed P-256 certificate and key, CN=nomad.test.
    const CERT_PEM: &str = include_str!("testdata/nomad-test.pem");
    const KEY_PEM: &str = include_str!("testdata/nomad-test-key.pem");

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn defaults_use_web_roots_without_client_auth() {
        let config = client_config(&NomadTlsConfig::default()).unwrap();
        assert!(!config.client_auth_cert_resolver.has_certs());
        assert!(root_store(&NomadTlsConfig::default()).unwrap().len() > 100);
    }

    #[test]
    fn configured_ca_replaces_web_roots() {
        let dir = tempfile::tempdir().unwrap();
        let ca = write(dir.path(), "ca.pem", CERT_PEM);
        let cfg = NomadTlsConfig {
            ca_cert: Some(ca),
            ..Default::default()
        };
        assert_eq!(root_store(&cfg).unwrap().len(), 1);
        assert!(client_config(&cfg).is_ok());
    }

    #[test]
    fn ca_path_loads_every_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.pem", CERT_PEM);
        write(dir.path(), "b.pem", CERT_PEM);
        let cfg = NomadTlsConfig {
            ca_path: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        assert_eq!(root_store(&cfg).unwrap().len(), 2);
    }

    #[test]
    fn client_identity_is_presented() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = NomadTlsConfig {
            client_cert: Some(write(dir.path(), "client.pem", CERT_PEM)),
            client_key: Some(write(dir.path(), "client-key.pem", KEY_PEM)),
            server_name: Some("server.global.nomad".into()),
            ..Default::default()
        };
        let config = client_config(&cfg).unwrap();
        assert!(config.client_auth_cert_resolver.has_certs());
    }

    #[test]
    fn unreadable_or_empty_pem_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = NomadTlsConfig {
            ca_cert: Some(dir.path().join("missing.pem")),
            ..Default::default()
        };
        assert!(matches!(client_config(&missing), Err(NomadError::Tls(_))));

        let empty = NomadTlsConfig {
            ca_cert: Some(write(dir.path(), "empty.pem", "not a pem\n")),
            ..Default::default()
        };
        assert!(matches!(client_config(&empty), Err(NomadError::Tls(_))));

        let no_key = NomadTlsConfig {
            client_cert: Some(write(dir.path(), "c.pem", CERT_PEM)),
            client_key: Some(write(dir.path(), "k.pem", CERT_PEM)),
            ..Default::default()
        };
        assert!(matches!(client_config(&no_key), Err(NomadError::Tls(_))));
    }

    #[test]
    fn skip_verify_accepts_any_chain() {
        let verifier = AcceptAnyServerCert {
            provider: Arc::new(ring::default_provider()),
        };
        let name = ServerName::try_from("anything.example").unwrap();
        let res = verifier.verify_server_cert(
            &CertificateDer::from(vec![0u8; 4]),
            &[],
            &name,
            &[],
            UnixTime::now(),
        );
        assert!(res.is_ok());
    }
}
