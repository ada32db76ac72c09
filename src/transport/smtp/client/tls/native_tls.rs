use ::native_tls::{Protocol, TlsConnector};

use super::{CertificateStore, TlsParametersBuilder};
use crate::transport::smtp::error::{self, Error};

pub(super) fn build_connector(builder: &TlsParametersBuilder) -> Result<TlsConnector, Error> {
    let mut tls_builder = TlsConnector::builder();

    match builder.cert_store {
        CertificateStore::Default => {}
        CertificateStore::None => {
            tls_builder.disable_built_in_roots(true);
        }
    }
    for cert in &builder.root_certs {
        tls_builder.add_root_certificate(cert.native_tls.clone());
    }
    tls_builder.danger_accept_invalid_hostnames(builder.accept_invalid_hostnames);
    tls_builder.danger_accept_invalid_certs(builder.accept_invalid_certs);
    tls_builder.min_protocol_version(Some(Protocol::Tlsv12));

    tls_builder.build().map_err(error::tls)
}
