use axum::async_trait;
use axum::extract::{FromRequestParts, Query, Request, State};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use serde::{Deserialize, Serialize};

use crate::model::users::{ConnectedUser, ServerUser};
use crate::tools::auth::TokenVerifier;
use crate::{error::Error, Result};

const BEARER: &str = "Bearer ";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenParams {
    token: Option<String>
}


pub async fn mw_token_resolver(verifier: State<TokenVerifier>, headers: HeaderMap, query: Query<TokenParams>, mut req: Request, next: Next) -> Result<Response> {
    let token: Option<String> = match headers.get("AUTHORIZATION").and_then(|t| t.to_str().ok()) {
        Some(token) => Some(token.replace(BEARER, "")),
        None => query.token.clone(),
    };
    let connected_user = parse_token(token.as_deref(), &verifier.0)?;
    req.extensions_mut().insert(connected_user);

    Ok(next.run(req).await)
}

pub fn parse_token(token: Option<&str>, verifier: &TokenVerifier) -> Result<ConnectedUser> {
    if let Some(token) = token {
        let claims = verifier.verify(token)?;
        Ok(ConnectedUser::Server(ServerUser::new(&claims.sub)))
    } else {
        Ok(ConnectedUser::Anonymous)
    }
}


#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ConnectedUser {
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {

		let server_user = parts
			.extensions
			.get::<ConnectedUser>().ok_or(Error::AuthFail)?
            .clone();

        Ok(server_user)
    }
}
