//! Adapter factory: resolves an [`AdapterKind`] name to a concrete
//! [`TransportAdapter`], validating credentials at construction time.
//! Grounded in
//! `examples/original_source/ttskit/telegram/factory.py::AdapterFactory`,
//! with its module-level `factory` singleton re-expressed as an explicit
//! struct the orchestrator constructs and owns rather than a global (per
//! SPEC_FULL §9's "no module-level singletons" note).

use std::sync::Arc;

use crate::config::AdapterKind;
use crate::error::AdapterError;
use crate::telegram::adapter::TransportAdapter;
use crate::telegram::frankenstein_adapter::FrankensteinAdapter;
use crate::telegram::grammers_adapter::GrammersAdapter;
use crate::telegram::tdlib_adapter::TdlibAdapter;
use crate::telegram::teloxide_adapter::TeloxideAdapter;

/// Bot tokens look like `<digits>:<35+ base64-ish chars>`.
pub fn validate_bot_token_shape(token: &str) -> bool {
    let Some((id_part, secret_part)) = token.split_once(':') else {
        return false;
    };
    if id_part.is_empty() || !id_part.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    secret_part.len() >= 35
        && secret_part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub struct AdapterFactory;

impl AdapterFactory {
    /// Builds the adapter named by `kind`, validating required credentials
    /// up front: `pyrogram`/`telethon` need `api_id`+`api_hash`; the other
    /// two only need a bot token. `telebot` additionally validates the
    /// token's shape, per spec §6.
    pub fn create_adapter(
        kind: AdapterKind,
        bot_token: &str,
        api_id: Option<i32>,
        api_hash: Option<&str>,
    ) -> Result<Arc<dyn TransportAdapter>, AdapterError> {
        if kind.requires_user_credentials() && (api_id.is_none() || api_hash.is_none()) {
            return Err(AdapterError::MissingCredentials {
                adapter: kind.as_str().to_string(),
                detail: "api_id and api_hash are required".to_string(),
            });
        }

        match kind {
            AdapterKind::Aiogram => Ok(Arc::new(TeloxideAdapter::new(bot_token))),
            AdapterKind::Telebot => {
                if !validate_bot_token_shape(bot_token) {
                    return Err(AdapterError::MalformedToken);
                }
                Ok(Arc::new(FrankensteinAdapter::new(bot_token)))
            }
            AdapterKind::Pyrogram => Ok(Arc::new(GrammersAdapter::new(
                bot_token,
                api_id.unwrap(),
                api_hash.unwrap().to_string(),
            ))),
            AdapterKind::Telethon => Ok(Arc::new(TdlibAdapter::new(
                bot_token,
                api_id.unwrap(),
                api_hash.unwrap().to_string(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_token_shape() {
        assert!(validate_bot_token_shape(
            "123456:ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijk"
        ));
    }

    #[test]
    fn rejects_missing_colon() {
        assert!(!validate_bot_token_shape("123456ABCDEF"));
    }

    #[test]
    fn rejects_short_secret() {
        assert!(!validate_bot_token_shape("123456:short"));
    }

    #[test]
    fn user_client_variants_require_credentials() {
        let err =
            AdapterFactory::create_adapter(AdapterKind::Pyrogram, "123456:xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx", None, None)
                .unwrap_err();
        assert!(matches!(err, AdapterError::MissingCredentials { .. }));
    }

    #[test]
    fn bot_token_only_variants_need_no_credentials() {
        let result = AdapterFactory::create_adapter(
            AdapterKind::Aiogram,
            "123456:xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx",
            None,
            None,
        );
        assert!(result.is_ok());
    }
}
