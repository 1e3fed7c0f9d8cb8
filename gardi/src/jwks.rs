use serde::Deserialize;

use crate::{jwa, jwk, Jwk};

/// A JSON Web Key Set (JWKS)
///
/// Deserialization is tolerant of key entries that this crate cannot use
/// (unknown key types, unknown algorithms): such entries are skipped with a
/// warning rather than failing the whole document, since an identity provider
/// may publish encryption keys alongside its signing keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Jwks {
    #[serde(deserialize_with = "deserialize_keys")]
    keys: Vec<Jwk>,
}

impl Jwks {
    /// Adds a key to the set
    pub fn add_key(&mut self, key: Jwk) {
        self.keys.push(key);
    }

    /// A view of the keys in this set
    pub fn keys(&self) -> &[Jwk] {
        &self.keys
    }

    /// Gets the key with the given key ID, usable with the given algorithm
    ///
    /// Key ID comparison is exact. A key that names a different algorithm or
    /// whose material is incompatible with `alg` is never returned, even on a
    /// `kid` match.
    pub fn get_key(&self, kid: &jwk::KeyIdRef, alg: jwa::Algorithm) -> Option<&Jwk> {
        self.keys.iter().find(|k| {
            k.key_id() == Some(kid)
                && k.is_compatible(alg)
                && k.algorithm().map_or(true, |key_alg| key_alg == alg)
        })
    }
}

fn deserialize_keys<'de, D>(deserializer: D) -> Result<Vec<Jwk>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MaybeJwk {
        Jwk(Jwk),
        Unknown(serde_json::Value),
    }

    let maybe = Vec::<MaybeJwk>::deserialize(deserializer)?;

    let keys = maybe
        .into_iter()
        .enumerate()
        .filter_map(|(idx, key)| match key {
            MaybeJwk::Jwk(jwk) => Some(jwk),
            MaybeJwk::Unknown(value) => {
                tracing::warn!(
                    jwks.idx = idx,
                    jwk.kid = value.get("kid").and_then(|v| v.as_str()),
                    "jwk.use" = value.get("use").and_then(|v| v.as_str()),
                    jwk.alg = value.get("alg").and_then(|v| v.as_str()),
                    "ignoring unusable JWK"
                );
                None
            }
        })
        .collect();

    Ok(keys)
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;

    use super::*;

    const JWKS_WITH_UNKNOWN_ALG: &str = r#"
        {
            "keys": [
                {
                    "kid": "1",
                    "kty": "RSA",
                    "use": "enc",
                    "alg": "RSA-OAEP"
                }
            ]
        }
    "#;

    const JWKS_WITH_UNKNOWN_KTY: &str = r#"
        {
            "keys": [
                {
                    "kid": "1",
                    "kty": "EC",
                    "use": "sig",
                    "alg": "ES256"
                }
            ]
        }
    "#;

    const JWKS_WITH_NOTHING: &str = r#"
        {
            "keys": [
                {}
            ]
        }
    "#;

    #[test]
    fn deserializes_jwks_with_unknown_alg() -> Result<()> {
        let jwks: Jwks = serde_json::from_str(JWKS_WITH_UNKNOWN_ALG)?;
        assert!(jwks.keys.is_empty());
        Ok(())
    }

    #[test]
    fn deserializes_jwks_with_unknown_kty() -> Result<()> {
        let jwks: Jwks = serde_json::from_str(JWKS_WITH_UNKNOWN_KTY)?;
        assert!(jwks.keys.is_empty());
        Ok(())
    }

    #[test]
    fn deserializes_jwks_with_nothing() -> Result<()> {
        let jwks: Jwks = serde_json::from_str(JWKS_WITH_NOTHING)?;
        assert!(jwks.keys.is_empty());
        Ok(())
    }

    const JWKS_WITH_MIXED_KEYS: &str = r#"
        {
            "keys": [
                { "kid": "ec", "kty": "EC", "use": "sig", "alg": "ES256" },
                { "kid": "good", "kty": "oct", "use": "sig", "alg": "HS256", "k": "dGVzdA" }
            ]
        }
    "#;

    #[test]
    fn skips_unusable_keys_but_keeps_good_ones() -> Result<()> {
        let jwks: Jwks = serde_json::from_str(JWKS_WITH_MIXED_KEYS)?;
        assert_eq!(jwks.keys().len(), 1);
        assert!(jwks
            .get_key(jwk::KeyIdRef::from_str("good"), jwa::Algorithm::HS256)
            .is_some());
        assert!(jwks
            .get_key(jwk::KeyIdRef::from_str("ec"), jwa::Algorithm::RS256)
            .is_none());
        Ok(())
    }

    const JWKS_WITH_LOCAL_KEY: &str = r#"
        {
            "keys": [
                { "kid": "local", "kty": "oct", "use": "sig", "alg": "HS256", "k": "dGVzdA" }
            ]
        }
    "#;

    #[test]
    fn lookup_rejects_algorithm_mismatch() -> Result<()> {
        let jwks: Jwks = serde_json::from_str(JWKS_WITH_LOCAL_KEY)?;
        assert!(jwks
            .get_key(jwk::KeyIdRef::from_str("local"), jwa::Algorithm::HS256)
            .is_some());
        assert!(jwks
            .get_key(jwk::KeyIdRef::from_str("local"), jwa::Algorithm::RS256)
            .is_none());
        Ok(())
    }
}
