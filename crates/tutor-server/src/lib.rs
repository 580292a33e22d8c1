//! Request gateway for the tutor chatbot
//!
//! Exposes the answer assembler over HTTP together with the auxiliary account
//! and content-transformation endpoints.

mod config;
mod error;
mod requests;
mod router;
mod transforms;


pub use config::{EmbeddingBackend, ServerConfig};
pub use error::ApiError;
pub use requests::{
    ChatRequest, ChatResponse, PersonalizeRequest, SigninRequest, SignupRequest, TargetLanguage,
    TranslateRequest, UserBackground,
};
pub use router::{AppState, router, serve};
pub use transforms::{personalize, personalize_prompt, translate, translate_prompt};
