//! Contract between the host auction server and a bidder adapter.

use std::fmt;
use std::str::FromStr;

use error_stack::Report;
use http::{HeaderMap, Method, StatusCode};
use sparteo_openrtb::{Bid, BidRequest, MarkupType};

use crate::error::AdapterError;

/// Trait implemented by every bidder adapter the host can register.
pub trait Bidder: Send + Sync {
    /// Turn one incoming request into the HTTP calls to make to the exchange.
    ///
    /// Errors that only affect part of the request are returned next to the
    /// request descriptors. An empty descriptor list means nothing should be
    /// sent.
    fn make_requests(
        &self,
        request: &BidRequest,
        request_info: &ExtraRequestInfo,
    ) -> (Vec<RequestData>, Vec<Report<AdapterError>>);

    /// Translate the exchange's answer to one of the calls built by
    /// [`Bidder::make_requests`].
    ///
    /// `Ok(None)` means the exchange had nothing to offer.
    ///
    /// # Errors
    ///
    /// Returns an error when the status code signals a failure or the body
    /// cannot be decoded.
    fn make_bids(
        &self,
        internal_request: &BidRequest,
        external_request: &RequestData,
        response: &ResponseData,
    ) -> Result<Option<BidderResponse>, Report<AdapterError>>;
}

/// Request-scoped data supplied by the host next to the bid request.
///
/// Sparteo reads nothing from it yet; hosts build it with `default()`.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct ExtraRequestInfo {}

/// Outbound HTTP call the host must perform for the adapter.
#[derive(Debug, Clone)]
pub struct RequestData {
    pub method: Method,
    pub uri: String,
    pub body: Vec<u8>,
    pub headers: HeaderMap,
    /// Impressions carried by this call, in request order.
    pub imp_ids: Vec<String>,
}

/// Raw exchange response as received by the host.
#[derive(Debug, Clone)]
pub struct ResponseData {
    pub status_code: StatusCode,
    pub body: Vec<u8>,
    pub headers: HeaderMap,
}

impl ResponseData {
    #[must_use]
    pub fn new(status_code: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status_code,
            body: body.into(),
            headers: HeaderMap::new(),
        }
    }
}

/// Media type of a returned bid as declared by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BidType {
    Banner,
    Video,
    Audio,
    Native,
}

impl BidType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Banner => "banner",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Native => "native",
        }
    }

    /// `OpenRTB` markup type matching this bid type.
    #[must_use]
    pub fn markup_type(self) -> MarkupType {
        match self {
            Self::Banner => MarkupType::Banner,
            Self::Video => MarkupType::Video,
            Self::Audio => MarkupType::Audio,
            Self::Native => MarkupType::Native,
        }
    }
}

impl fmt::Display for BidType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BidType {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "banner" => Ok(Self::Banner),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "native" => Ok(Self::Native),
            other => Err(AdapterError::BadServerResponse {
                message: format!("invalid BidType: {other}"),
            }),
        }
    }
}

/// A bid paired with its resolved media type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedBid {
    pub bid: Bid,
    pub bid_type: BidType,
}

/// Bids returned by one exchange call.
#[derive(Debug, Clone, PartialEq)]
pub struct BidderResponse {
    pub currency: String,
    pub bids: Vec<TypedBid>,
}

impl BidderResponse {
    /// Empty response priced in USD until the exchange says otherwise.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            currency: "USD".to_string(),
            bids: Vec::with_capacity(capacity),
        }
    }
}

impl Default for BidderResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// True when the exchange answered `204 No Content`.
#[must_use]
pub fn is_response_status_code_no_content(response: &ResponseData) -> bool {
    response.status_code == StatusCode::NO_CONTENT
}

/// Map unexpected statuses to adapter errors.
///
/// Only `200` passes. `400` is reported as [`AdapterError::BadInput`]; every
/// other status as [`AdapterError::BadServerResponse`]. Callers check for
/// `204` with [`is_response_status_code_no_content`] first.
///
/// # Errors
///
/// Returns an error for any status other than `200 OK`.
pub fn check_response_status_code_for_errors(
    response: &ResponseData,
) -> Result<(), Report<AdapterError>> {
    let status = response.status_code;
    if status == StatusCode::OK {
        return Ok(());
    }

    let message = format!(
        "Unexpected status code: {}. Run with request.debug = 1 for more info",
        status.as_u16()
    );
    if status == StatusCode::BAD_REQUEST {
        Err(Report::new(AdapterError::BadInput { message }))
    } else {
        Err(Report::new(AdapterError::BadServerResponse { message }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_bid_type_parsing_is_strict() {
        assert_eq!("banner".parse::<BidType>().ok(), Some(BidType::Banner));
        assert_eq!("video".parse::<BidType>().ok(), Some(BidType::Video));
        assert_eq!("audio".parse::<BidType>().ok(), Some(BidType::Audio));
        assert_eq!("native".parse::<BidType>().ok(), Some(BidType::Native));

        for invalid in ["", "Banner", "display", " video"] {
            let err = invalid.parse::<BidType>().expect_err(invalid);
            assert_eq!(err.to_string(), format!("invalid BidType: {invalid}"));
        }
    }

    #[test]
    fn test_bid_type_markup_type() {
        assert_eq!(BidType::Banner.markup_type(), MarkupType::Banner);
        assert_eq!(BidType::Video.markup_type(), MarkupType::Video);
        assert_eq!(BidType::Native.markup_type(), MarkupType::Native);
        assert_eq!(BidType::Audio.to_string(), "audio");
    }

    #[test]
    fn test_no_content_detection() {
        assert!(is_response_status_code_no_content(&ResponseData::new(
            StatusCode::NO_CONTENT,
            Vec::new()
        )));
        assert!(!is_response_status_code_no_content(&ResponseData::new(
            StatusCode::OK,
            "{}"
        )));
    }

    #[test]
    fn test_status_code_classification() {
        let ok = ResponseData::new(StatusCode::OK, "");
        assert!(check_response_status_code_for_errors(&ok).is_ok());

        let err = check_response_status_code_for_errors(&ResponseData::new(
            StatusCode::BAD_REQUEST,
            "",
        ))
        .expect_err("400 should fail");
        assert_eq!(err.current_context().kind(), ErrorKind::BadInput);
        assert_eq!(
            err.current_context().to_string(),
            "Unexpected status code: 400. Run with request.debug = 1 for more info"
        );

        for status in [
            StatusCode::CREATED,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::NOT_FOUND,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            let err = check_response_status_code_for_errors(&ResponseData::new(status, ""))
                .expect_err("non-200 should fail");
            assert_eq!(err.current_context().kind(), ErrorKind::BadServerResponse);
        }
    }

    #[test]
    fn test_bidder_response_defaults_to_usd() {
        let response = BidderResponse::default();
        assert_eq!(response.currency, "USD");
        assert!(response.bids.is_empty());
    }
}
