//! Sparteo bidder adapter.
//!
//! Rewrites `OpenRTB` requests into the shape the Sparteo exchange expects and
//! maps its answers back into typed bids.

use error_stack::{bail, Report, ResultExt};
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use sparteo_openrtb::{Bid, BidRequest, BidResponse, Imp, Publisher};

use crate::bidder::{
    check_response_status_code_for_errors, is_response_status_code_no_content, BidType, Bidder,
    BidderResponse, ExtraRequestInfo, RequestData, ResponseData, TypedBid,
};
use crate::error::AdapterError;
use crate::json_ext::{merge_object, object_or_empty, take_object, take_object_or_empty};
use crate::logging::is_debug_enabled;
use crate::macros::{resolve_macros, EndpointTemplate, EndpointTemplateParams};
use crate::settings::{AdapterConfig, ServerConfig};

pub const SPARTEO_BIDDER_NAME: &str = "sparteo";

const EXT_SPARTEO_KEY: &str = "sparteo";
const EXT_PARAMS_KEY: &str = "params";
const EXT_BIDDER_KEY: &str = "bidder";
const NETWORK_ID_KEY: &str = "networkId";

// ============================================================================
// Extension Types
// ============================================================================

/// Generic `imp.ext` wrapper; bidder parameters sit under `bidder`.
#[derive(Debug, Deserialize)]
struct ExtImpBidder {
    bidder: Json,
}

/// Sparteo bidder parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtImpSparteo {
    #[serde(rename = "networkId", default)]
    pub network_id: String,
}

/// `bid.ext` wrapper carrying the declared media type.
#[derive(Debug, Default, Deserialize)]
struct ExtBidWrapper {
    #[serde(default)]
    prebid: ExtBidPrebid,
}

#[derive(Debug, Default, Deserialize)]
struct ExtBidPrebid {
    #[serde(rename = "type", default)]
    bid_type: String,
}

// ============================================================================
// Adapter
// ============================================================================

/// Sparteo adapter. Holds nothing but the parsed endpoint template, so one
/// instance can serve every request.
#[derive(Debug)]
pub struct SparteoAdapter {
    endpoint: EndpointTemplate,
}

/// Build the Sparteo adapter for the host.
///
/// # Errors
///
/// Returns [`AdapterError::Configuration`] when the adapter is disabled and
/// [`AdapterError::Template`] when the endpoint template cannot be parsed.
pub fn builder(
    bidder_name: &str,
    config: &AdapterConfig,
    server: &ServerConfig,
) -> Result<Box<dyn Bidder>, Report<AdapterError>> {
    if config.disabled {
        bail!(AdapterError::Configuration {
            message: format!("{bidder_name} adapter is disabled"),
        });
    }

    let adapter = SparteoAdapter::new(config)?;

    log::info!(
        "Registering {} adapter (gvl_id: {}, datacenter: {}, endpoint: {})",
        bidder_name,
        server.gvl_id,
        server.datacenter.as_deref().unwrap_or("unknown"),
        adapter.endpoint.source()
    );

    Ok(Box::new(adapter))
}

impl SparteoAdapter {
    /// Create the adapter from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Template`] when the endpoint template cannot be
    /// parsed.
    pub fn new(config: &AdapterConfig) -> Result<Self, Report<AdapterError>> {
        let endpoint =
            EndpointTemplate::parse(&config.endpoint).change_context(AdapterError::Template {
                message: "unable to parse endpoint url template".to_string(),
            })?;

        Ok(Self { endpoint })
    }

    fn build_endpoint_url(
        &self,
        network_id: &str,
        domain: &str,
        bundle: &str,
    ) -> Result<String, Report<AdapterError>> {
        let params = EndpointTemplateParams {
            network_id: network_id.to_string(),
            domain: domain.to_string(),
            bundle: bundle.to_string(),
        };
        resolve_macros(&self.endpoint, &params)
    }

    /// Resolve the media type declared in `bid.ext.prebid.type`.
    ///
    /// Audio is a valid type upstream but Sparteo does not serve it.
    fn get_media_type(bid: &Bid) -> Result<BidType, Report<AdapterError>> {
        let unmarshal_error = || AdapterError::BadServerResponse {
            message: format!("error unmarshaling bid ext for bid id={}", bid.id),
        };

        let ext = match bid.ext.as_ref() {
            Some(ext @ Json::Object(_)) => ext.clone(),
            Some(_) => bail!(unmarshal_error()),
            None => return Err(Report::new(unmarshal_error()).attach("bid.ext is missing")),
        };

        let wrapper: ExtBidWrapper = serde_json::from_value(ext).change_context(unmarshal_error())?;

        let bid_type: BidType = wrapper.prebid.bid_type.parse().change_context(
            AdapterError::BadServerResponse {
                message: format!("error parsing bid type for bid id={}", bid.id),
            },
        )?;

        if bid_type == BidType::Audio {
            return Err(Report::new(AdapterError::BadServerResponse {
                message: format!(
                    "bid type \"{}\" is not supported for bid id={}",
                    bid_type, bid.id
                ),
            }));
        }

        Ok(bid_type)
    }
}

// ============================================================================
// Request Helpers
// ============================================================================

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// `site.domain`, then `site.publisher.domain`, then `app.domain`.
fn resolve_domain(request: &BidRequest) -> String {
    let site_domain = request.site.as_ref().and_then(|site| {
        non_empty(site.domain.as_deref()).or_else(|| {
            site.publisher
                .as_ref()
                .and_then(|publisher| non_empty(publisher.domain.as_deref()))
        })
    });

    site_domain
        .or_else(|| {
            request
                .app
                .as_ref()
                .and_then(|app| non_empty(app.domain.as_deref()))
        })
        .unwrap_or_default()
        .to_string()
}

fn resolve_bundle(request: &BidRequest) -> String {
    request
        .app
        .as_ref()
        .and_then(|app| app.bundle.clone())
        .unwrap_or_default()
}

fn parse_ext(imp: &Imp) -> Result<ExtImpSparteo, Report<AdapterError>> {
    let decode_error = |what: &str| AdapterError::BadInput {
        message: format!("ignoring imp id={}, error while decoding {}", imp.id, what),
    };

    // Derived struct decoding also accepts arrays; only objects are valid here.
    let ext = match imp.ext.as_ref() {
        Some(ext @ Json::Object(_)) => ext.clone(),
        Some(_) => bail!(decode_error("extImpBidder")),
        None => {
            return Err(Report::new(decode_error("extImpBidder")).attach("imp.ext is missing"))
        }
    };

    let bidder_ext: ExtImpBidder =
        serde_json::from_value(ext).change_context(decode_error("extImpBidder"))?;

    match bidder_ext.bidder {
        Json::Null => Ok(ExtImpSparteo::default()),
        bidder @ Json::Object(_) => {
            serde_json::from_value(bidder).change_context(decode_error("impExt"))
        }
        _ => Err(Report::new(decode_error("impExt")).attach("bidder is not an object")),
    }
}

/// Move `ext.bidder` into `ext.sparteo.params`, keeping everything else.
fn reshape_imp_ext(imp: &Imp) -> Result<Json, Report<AdapterError>> {
    let Some(Json::Object(ext)) = imp.ext.as_ref() else {
        return Err(Report::new(AdapterError::BadInput {
            message: format!(
                "ignoring imp id={}, error while unmarshaling ext: not an object",
                imp.id
            ),
        }));
    };

    let mut ext = ext.clone();
    let bidder = take_object(&mut ext, EXT_BIDDER_KEY);

    let mut sparteo = take_object_or_empty(&mut ext, EXT_SPARTEO_KEY);
    let mut params = take_object_or_empty(&mut sparteo, EXT_PARAMS_KEY);
    if let Some(bidder) = bidder {
        merge_object(&mut params, bidder);
    }
    sparteo.insert(EXT_PARAMS_KEY.to_string(), Json::Object(params));
    ext.insert(EXT_SPARTEO_KEY.to_string(), Json::Object(sparteo));

    serde_json::to_value(&ext).change_context(AdapterError::BadInput {
        message: format!(
            "ignoring imp id={}, error while marshaling updated ext",
            imp.id
        ),
    })
}

fn ensure_publisher(publisher: &mut Option<Publisher>) -> &mut Publisher {
    if publisher.is_none() {
        log::debug!("Sparteo: creating missing publisher object");
    }
    publisher.get_or_insert_with(Publisher::default)
}

/// Set `params.networkId` in a publisher ext, keeping every other key.
fn update_publisher_extension(
    target_ext: Option<&Json>,
    network_id: &str,
    field_path: &str,
) -> Result<Json, Report<AdapterError>> {
    if target_ext.is_some_and(|ext| !ext.is_object()) {
        log::debug!("Sparteo: {field_path} is not an object, replacing it");
    }
    let mut pub_ext = object_or_empty(target_ext);

    let mut params = take_object_or_empty(&mut pub_ext, EXT_PARAMS_KEY);
    params.insert(
        NETWORK_ID_KEY.to_string(),
        Json::String(network_id.to_string()),
    );
    pub_ext.insert(EXT_PARAMS_KEY.to_string(), Json::Object(params));

    serde_json::to_value(&pub_ext).change_context(AdapterError::BadInput {
        message: format!("Error marshaling {field_path}"),
    })
}

// ============================================================================
// Bidder Implementation
// ============================================================================

impl Bidder for SparteoAdapter {
    fn make_requests(
        &self,
        request: &BidRequest,
        _request_info: &ExtraRequestInfo,
    ) -> (Vec<RequestData>, Vec<Report<AdapterError>>) {
        let mut request = request.clone();
        let mut errors = Vec::new();

        let domain = resolve_domain(&request);
        let bundle = resolve_bundle(&request);

        let mut network_id = String::new();
        for imp in &mut request.imp {
            let params = match parse_ext(imp) {
                Ok(params) => params,
                Err(err) => {
                    errors.push(err);
                    continue;
                }
            };
            if network_id.is_empty() && !params.network_id.is_empty() {
                network_id = params.network_id;
            }

            match reshape_imp_ext(imp) {
                Ok(ext) => imp.ext = Some(ext),
                Err(err) => errors.push(err),
            }
        }

        let publisher = if let Some(site) = request.site.as_mut() {
            Some((ensure_publisher(&mut site.publisher), "site.publisher.ext"))
        } else if let Some(app) = request.app.as_mut() {
            Some((ensure_publisher(&mut app.publisher), "app.publisher.ext"))
        } else {
            None
        };

        match publisher {
            Some((publisher, field_path)) => {
                match update_publisher_extension(publisher.ext.as_ref(), &network_id, field_path) {
                    Ok(ext) => publisher.ext = Some(ext),
                    Err(err) => errors.push(err),
                }
            }
            None => log::debug!("Sparteo: request {} has neither site nor app", request.id),
        }

        let body = match serde_json::to_vec(&request) {
            Ok(body) => body,
            Err(err) => {
                errors.push(Report::new(err).change_context(AdapterError::Serialization {
                    message: format!("failed to serialize bid request {}", request.id),
                }));
                return (Vec::new(), errors);
            }
        };

        let uri = match self.build_endpoint_url(&network_id, &domain, &bundle) {
            Ok(uri) => uri,
            Err(err) => return (Vec::new(), vec![err]),
        };

        log::info!(
            "Sparteo: request {} with {} imps to {} ({} non-fatal errors)",
            request.id,
            request.imp.len(),
            uri,
            errors.len()
        );
        if is_debug_enabled() {
            log::debug!("Sparteo: outbound body {}", String::from_utf8_lossy(&body));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let request_data = RequestData {
            method: Method::POST,
            uri,
            body,
            headers,
            imp_ids: request.imp_ids(),
        };

        (vec![request_data], errors)
    }

    fn make_bids(
        &self,
        _internal_request: &BidRequest,
        _external_request: &RequestData,
        response: &ResponseData,
    ) -> Result<Option<BidderResponse>, Report<AdapterError>> {
        if is_response_status_code_no_content(response) {
            log::debug!("Sparteo: no content");
            return Ok(None);
        }

        if let Err(err) = check_response_status_code_for_errors(response) {
            log::warn!("Sparteo returned non-success status: {}", response.status_code);
            return Err(err);
        }

        let bid_response: BidResponse = serde_json::from_slice(&response.body).change_context(
            AdapterError::BadServerResponse {
                message: "Failed to parse Sparteo response JSON".to_string(),
            },
        )?;

        let mut bidder_response = BidderResponse::new();
        bidder_response.currency = bid_response.cur;

        for seat_bid in bid_response.seatbid {
            for mut bid in seat_bid.bid {
                let bid_type = match Self::get_media_type(&bid) {
                    Ok(bid_type) => bid_type,
                    Err(err) => {
                        log::debug!("Sparteo: skipping bid {}: {err:?}", bid.id);
                        continue;
                    }
                };

                bid.mtype = match bid_type {
                    BidType::Banner | BidType::Video | BidType::Native => {
                        Some(bid_type.markup_type())
                    }
                    BidType::Audio => continue,
                };

                bidder_response.bids.push(TypedBid { bid, bid_type });
            }
        }

        log::info!("Sparteo returned {} bids", bidder_response.bids.len());

        Ok(Some(bidder_response))
    }
}

// ============================================================================
// Tests
// ============================================================================
