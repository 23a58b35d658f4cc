//! Certificate bundle derivation for the deployment stream

use envset_param::{origin, ParamMap, Parameter};
use md5::{Digest, Md5};

use crate::keys::{
    CA_BUNDLE_CERTIFICATE, CERTIFICATE_BUNDLE_MD5SUM, DEFAULT_SSL_CERTIFICATES_BUNDLE,
    DEFAULT_SSL_SECRET, SSL_SECRET, SSL_SECRET_VALUE,
};

/// Lowercase hex MD5 digest of `text`
#[must_use]
pub fn md5_hex(text: &str) -> String {
    hex::encode(Md5::digest(text.as_bytes()))
}

/// Derive certificate parameters.
///
/// A bundle in `parameters` is copied into `credentials` under
/// [`SSL_SECRET_VALUE`] and [`CA_BUNDLE_CERTIFICATE`]; a non-empty bundle
/// also gets its digest recorded as [`CERTIFICATE_BUNDLE_MD5SUM`]. A missing
/// [`SSL_SECRET`] falls back to [`DEFAULT_SSL_SECRET`].
pub fn derive_ssl_parameters(parameters: &mut ParamMap, credentials: &mut ParamMap) {
    if let Some(bundle) = parameters.get(DEFAULT_SSL_CERTIFICATES_BUNDLE).cloned() {
        let mut secured = bundle.clone();
        secured.mark_secured();
        credentials.insert(SSL_SECRET_VALUE.to_string(), secured.clone());
        credentials.insert(CA_BUNDLE_CERTIFICATE.to_string(), secured);

        let text = bundle.value.scalar_text().unwrap_or_default();
        if !text.is_empty() {
            parameters.insert(
                CERTIFICATE_BUNDLE_MD5SUM.to_string(),
                Parameter::new(md5_hex(&text)).with_origin(origin::ENVGENE_CALCULATED),
            );
        }
    }

    if !parameters.contains_key(SSL_SECRET) {
        parameters.insert(
            SSL_SECRET.to_string(),
            Parameter::new(DEFAULT_SSL_SECRET).with_origin(origin::ENVGENE_DEFAULT),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_lowercase_hex() {
        assert_eq!(md5_hex(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn bundle_is_aliased_and_digested() {
        let mut parameters = ParamMap::new();
        parameters.insert(
            DEFAULT_SSL_CERTIFICATES_BUNDLE.into(),
            Parameter::new("abc").with_origin("Env/Cloud: t/c"),
        );
        let mut credentials = ParamMap::new();
        derive_ssl_parameters(&mut parameters, &mut credentials);

        assert_eq!(credentials[SSL_SECRET_VALUE].as_str(), Some("abc"));
        assert!(credentials[CA_BUNDLE_CERTIFICATE].secured);
        assert_eq!(
            parameters[CERTIFICATE_BUNDLE_MD5SUM].as_str(),
            Some("900150983cd24fb0d6963f7d28e17f72")
        );
        assert_eq!(parameters[SSL_SECRET].as_str(), Some(DEFAULT_SSL_SECRET));
        assert_eq!(parameters[SSL_SECRET].origin(), Some("envgene default"));
    }

    #[test]
    fn explicit_secret_is_kept_and_empty_bundle_not_digested() {
        let mut parameters = ParamMap::new();
        parameters.insert(DEFAULT_SSL_CERTIFICATES_BUNDLE.into(), Parameter::new(""));
        parameters.insert(SSL_SECRET.into(), Parameter::new("custom"));
        let mut credentials = ParamMap::new();
        derive_ssl_parameters(&mut parameters, &mut credentials);

        assert!(!parameters.contains_key(CERTIFICATE_BUNDLE_MD5SUM));
        assert_eq!(parameters[SSL_SECRET].as_str(), Some("custom"));
        assert!(credentials.contains_key(SSL_SECRET_VALUE));
    }
}
