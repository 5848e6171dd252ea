pub(crate) mod adc;
pub(crate) mod assertion;
pub(crate) mod callback_server;
pub(crate) mod interactive;
pub(crate) mod introspect;
pub(crate) mod pkce;
pub(crate) mod refresh;
pub(crate) mod resolver;
pub(crate) mod sso;
pub(crate) mod token_exchange;
