//! TLS configuration for the SMTP client
//!
//! The same [`TlsParameters`] serve for implicit TLS on port 465 and for a
//! `STARTTLS` upgrade. They are built either with `native-tls` or with
//! `rustls`, depending on the enabled features.

use std::fmt::{self, Debug};

#[cfg(any(feature = "native-tls", feature = "rustls"))]
use crate::transport::smtp::error;
use crate::transport::smtp::Error;

#[cfg(feature = "native-tls")]
mod native_tls;
#[cfg(feature = "rustls")]
mod rustls;

/// Source for the base set of root certificates to trust
#[allow(missing_copy_implementations)]
#[derive(Clone, Debug, Default)]
pub enum CertificateStore {
    /// Use the default for the TLS backend
    ///
    /// For native-tls, this is the system certificate store. For rustls,
    /// the Mozilla roots from `webpki-roots`.
    #[default]
    Default,
    /// Don't use any root certificate besides the ones added to the builder
    None,
}

/// Parameters to use for secure clients
#[derive(Clone)]
pub struct TlsParameters {
    pub(crate) connector: InnerTlsParameters,
    /// The domain name which is expected in the TLS certificate from the server
    domain: String,
    accept_invalid_certs: bool,
    accept_invalid_hostnames: bool,
}

impl Debug for TlsParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsParameters")
            .field("domain", &self.domain)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("accept_invalid_hostnames", &self.accept_invalid_hostnames)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
#[allow(clippy::enum_variant_names)]
pub(crate) enum InnerTlsParameters {
    #[cfg(feature = "native-tls")]
    NativeTls(::native_tls::TlsConnector),
    #[cfg(feature = "rustls")]
    Rustls(std::sync::Arc<::rustls::ClientConfig>),
}

impl TlsParameters {
    /// Creates new `TlsParameters` with the default settings, using
    /// native-tls or rustls depending on which one is available
    pub fn new<S: Into<String>>(domain: S) -> Result<Self, Error> {
        TlsParametersBuilder::new(domain).build()
    }

    /// Creates a new `TlsParameters` builder
    pub fn builder<S: Into<String>>(domain: S) -> TlsParametersBuilder {
        TlsParametersBuilder::new(domain)
    }

    /// The domain name expected in the server certificate
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Whether certificate validation is disabled
    pub fn accepts_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }

    /// Whether hostname validation is disabled
    pub fn accepts_invalid_hostnames(&self) -> bool {
        self.accept_invalid_hostnames
    }
}

/// Builder for `TlsParameters`
#[derive(Debug, Clone)]
pub struct TlsParametersBuilder {
    domain: String,
    cert_store: CertificateStore,
    root_certs: Vec<Certificate>,
    accept_invalid_hostnames: bool,
    accept_invalid_certs: bool,
}

impl TlsParametersBuilder {
    /// Creates a new builder for `TlsParameters`
    pub fn new<S: Into<String>>(domain: S) -> Self {
        Self {
            domain: domain.into(),
            cert_store: CertificateStore::Default,
            root_certs: Vec::new(),
            accept_invalid_hostnames: false,
            accept_invalid_certs: false,
        }
    }

    /// Set the source for the base set of root certificates to trust
    pub fn certificate_store(mut self, cert_store: CertificateStore) -> Self {
        self.cert_store = cert_store;
        self
    }

    /// Add a custom root certificate
    ///
    /// Can be used to safely connect to a server using a self-signed certificate, for example.
    pub fn add_root_certificate(mut self, cert: Certificate) -> Self {
        self.root_certs.push(cert);
        self
    }

    /// Controls whether certificates with an invalid hostname are accepted
    ///
    /// Defaults to `false`.
    ///
    /// # Warning
    ///
    /// If hostname verification is disabled *any* valid certificate,
    /// including those from other sites, is trusted.
    pub fn dangerous_accept_invalid_hostnames(mut self, accept_invalid_hostnames: bool) -> Self {
        self.accept_invalid_hostnames = accept_invalid_hostnames;
        self
    }

    /// Controls whether invalid certificates are accepted
    ///
    /// Defaults to `false`.
    ///
    /// # Warning
    ///
    /// If certificate verification is disabled, *any* certificate
    /// is trusted for use, including:
    ///
    /// * Self signed certificates
    /// * Certificates from different hostnames
    /// * Expired certificates
    pub fn dangerous_accept_invalid_certs(mut self, accept_invalid_certs: bool) -> Self {
        self.accept_invalid_certs = accept_invalid_certs;
        self
    }

    /// Creates a new `TlsParameters` using native-tls or rustls
    /// depending on which one is available
    ///
    /// Fails when the crate was built without a TLS backend.
    pub fn build(self) -> Result<TlsParameters, Error> {
        #[cfg(feature = "rustls")]
        return self.build_rustls();
        #[cfg(all(not(feature = "rustls"), feature = "native-tls"))]
        return self.build_native();
        #[cfg(not(any(feature = "rustls", feature = "native-tls")))]
        return Err(crate::transport::smtp::error::tls(
            "no TLS backend enabled, enable the `native-tls` or `rustls` feature",
        ));
    }

    /// Creates a new `TlsParameters` using native-tls with the provided configuration
    #[cfg(feature = "native-tls")]
    #[cfg_attr(docsrs, doc(cfg(feature = "native-tls")))]
    pub fn build_native(self) -> Result<TlsParameters, Error> {
        let connector = native_tls::build_connector(&self)?;
        Ok(self.into_parameters(InnerTlsParameters::NativeTls(connector)))
    }

    /// Creates a new `TlsParameters` using rustls with the provided configuration
    #[cfg(feature = "rustls")]
    #[cfg_attr(docsrs, doc(cfg(feature = "rustls")))]
    pub fn build_rustls(self) -> Result<TlsParameters, Error> {
        let config = rustls::build_config(&self)?;
        Ok(self.into_parameters(InnerTlsParameters::Rustls(config)))
    }

    #[cfg(any(feature = "native-tls", feature = "rustls"))]
    fn into_parameters(self, connector: InnerTlsParameters) -> TlsParameters {
        TlsParameters {
            connector,
            domain: self.domain,
            accept_invalid_certs: self.accept_invalid_certs,
            accept_invalid_hostnames: self.accept_invalid_hostnames,
        }
    }
}

/// A certificate that can be used with [`TlsParametersBuilder::add_root_certificate`]
#[derive(Clone)]
#[allow(missing_copy_implementations)]
pub struct Certificate {
    #[cfg(feature = "native-tls")]
    native_tls: ::native_tls::Certificate,
    #[cfg(feature = "rustls")]
    rustls: Vec<::rustls::pki_types::CertificateDer<'static>>,
}

#[cfg(any(feature = "native-tls", feature = "rustls"))]
impl Certificate {
    /// Create a `Certificate` from a DER encoded certificate
    pub fn from_der(der: Vec<u8>) -> Result<Self, Error> {
        Ok(Self {
            #[cfg(feature = "native-tls")]
            native_tls: ::native_tls::Certificate::from_der(&der).map_err(error::tls)?,
            #[cfg(feature = "rustls")]
            rustls: vec![der.into()],
        })
    }

    /// Create a `Certificate` from a PEM encoded certificate
    ///
    /// With rustls, every certificate of a PEM bundle is kept.
    pub fn from_pem(pem: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            #[cfg(feature = "native-tls")]
            native_tls: ::native_tls::Certificate::from_pem(pem).map_err(error::tls)?,
            #[cfg(feature = "rustls")]
            rustls: rustls::certificates_from_pem(pem)?,
        })
    }
}

impl Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate").finish_non_exhaustive()
    }
}

/// Default parameters for connecting to `host`
pub(crate) fn default_parameters(host: &str) -> Result<TlsParameters, Error> {
    TlsParameters::new(host)
}
