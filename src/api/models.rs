use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PayRequest {
    pub invoice: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PayResponse {
    pub result: String,
}

#[derive(Debug, Serialize)]
pub struct ListenResponse {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
