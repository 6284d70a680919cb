use axum::extract::{FromRequest, Request};
use axum::response::IntoResponse;
use bytes::Bytes;
use bytestring::ByteString;
use http::StatusCode;

pub struct ByteStringBody(pub ByteString);

#[async_trait::async_trait]
impl<S: Send + Sync> FromRequest<S> for ByteStringBody {
    type Rejection = axum::response::Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let string = bytes
            .try_into()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body didn't contain valid UTF-8").into_response())?;

        Ok(ByteStringBody(string))
    }
}

pub mod serde {
    /// (De)serialize a [`std::time::Duration`] in [`humantime`] notation,
    /// e.g. `"1m"` or `"250ms"`.
    pub mod humantime_duration {
        use std::time::Duration;

        use serde::{Deserialize as _, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(&humantime::format_duration(*duration))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
            let s = std::borrow::Cow::<'de, str>::deserialize(deserializer)?;
            humantime::parse_duration(&s).map_err(serde::de::Error::custom)
        }
    }
}
