pub mod pkce;
pub mod token_cipher;
