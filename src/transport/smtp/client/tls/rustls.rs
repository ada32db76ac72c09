use std::sync::Arc;

use ::rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider},
    pki_types::{self, pem::PemObject, UnixTime},
    server::ParsedCertificate,
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
};

use super::{CertificateStore, TlsParametersBuilder};
use crate::transport::smtp::error::{self, Error};

pub(super) fn build_config(builder: &TlsParametersBuilder) -> Result<Arc<ClientConfig>, Error> {
    let crypto_provider = Arc::new(::rustls::crypto::ring::default_provider());
    let tls = ClientConfig::builder_with_provider(Arc::clone(&crypto_provider))
        .with_protocol_versions(::rustls::ALL_VERSIONS)
        .map_err(error::tls)?;

    let mut root_cert_store = RootCertStore::empty();
    match builder.cert_store {
        CertificateStore::Default => {
            root_cert_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        }
        CertificateStore::None => {}
    }
    for cert in &builder.root_certs {
        for der in &cert.rustls {
            root_cert_store.add(der.clone()).map_err(error::tls)?;
        }
    }

    let tls = if builder.accept_invalid_certs || builder.accept_invalid_hostnames {
        let verifier = InvalidCertsVerifier {
            ignore_invalid_hostnames: builder.accept_invalid_hostnames,
            ignore_invalid_certs: builder.accept_invalid_certs,
            roots: root_cert_store,
            crypto_provider,
        };
        tls.dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
    } else {
        tls.with_root_certificates(root_cert_store)
    };

    Ok(Arc::new(tls.with_no_client_auth()))
}

pub(super) fn certificates_from_pem(
    pem: &[u8],
) -> Result<Vec<pki_types::CertificateDer<'static>>, Error> {
    pki_types::CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, pki_types::pem::Error>>()
        .map_err(|_| error::tls("invalid certificate"))
}

/// Validates the server certificate with some checks turned off
#[derive(Debug)]
struct InvalidCertsVerifier {
    ignore_invalid_hostnames: bool,
    ignore_invalid_certs: bool,
    roots: RootCertStore,
    crypto_provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for InvalidCertsVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &pki_types::CertificateDer<'_>,
        intermediates: &[pki_types::CertificateDer<'_>],
        server_name: &pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, ::rustls::Error> {
        let cert = ParsedCertificate::try_from(end_entity)?;

        if !self.ignore_invalid_certs {
            ::rustls::client::verify_server_cert_signed_by_trust_anchor(
                &cert,
                &self.roots,
                intermediates,
                now,
                self.crypto_provider.signature_verification_algorithms.all,
            )?;
        }

        if !self.ignore_invalid_hostnames {
            ::rustls::client::verify_server_name(&cert, server_name)?;
        }
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &pki_types::CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, ::rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.crypto_provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &pki_types::CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, ::rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.crypto_provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.crypto_provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
