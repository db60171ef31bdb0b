// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use axum::http::header::{HeaderMap, COOKIE, SET_COOKIE};
use axum::http::HeaderValue;
use axum::response::Response;
use uuid::Uuid;

const SESSION_COOKIE: &str = "chartwright_session";

/// The session id carried by the request, if any.
pub fn session_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    let cookies = headers.get(COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name == SESSION_COOKIE {
            Uuid::parse_str(value).ok()
        } else {
            None
        }
    })
}

/// Existing session id, or a fresh one that must be handed back to the
/// browser via [`attach_session_cookie`].
pub fn ensure_session(headers: &HeaderMap) -> (Uuid, bool) {
    match session_from_headers(headers) {
        Some(id) => (id, false),
        None => (Uuid::new_v4(), true),
    }
}

pub fn attach_session_cookie(mut response: Response, session: Uuid) -> Response {
    let cookie = format!("{SESSION_COOKIE}={session}; Path=/; HttpOnly; SameSite=Lax");
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().append(SET_COOKIE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_the_session_cookie() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("other=1; {SESSION_COOKIE}={id}")).unwrap(),
        );
        assert_eq!(session_from_headers(&headers), Some(id));
        assert_eq!(ensure_session(&headers), (id, false));
    }

    #[test]
    fn missing_cookie_mints_a_new_session() {
        let headers = HeaderMap::new();
        let (id, fresh) = ensure_session(&headers);
        assert!(fresh);
        assert_ne!(id, Uuid::nil());
    }
}
