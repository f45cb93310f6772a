mod callback;
mod init;

pub use callback::OAuthCallbackHandler;
pub use init::init_oauth;
