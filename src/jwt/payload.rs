//! Token payload construction.
//!
//! Claims are split into four disjoint groups, checked in this order:
//! authentication methods, scopes, JSON values, and everything else.
//! Normal claims go in one by one (a repeated type becomes an array),
//! scopes become one ordered array, authentication methods one array of
//! distinct values. JSON claims are grouped by type: a single object is
//! added as is, several objects become an array of objects, and arrays are
//! concatenated.

use crate::error::TokenError;
use crate::jwt::claims::{claim_types, ClaimValue, Token};
use serde_json::{Map, Value};

/// JWT payload object.
pub type Payload = Map<String, Value>;

/// Merge the token's registered fields and claims into a payload.
///
/// # Errors
///
/// - [`TokenError::UnsupportedClaimType`] when a JSON claim type holds
///   values that are not all objects or not all arrays. Every offending
///   type is reported.
/// - [`TokenError::ClaimConflict`] when a JSON claim type is also used by
///   a non-JSON claim or a registered field.
pub fn build_payload(token: &Token) -> Result<Payload, TokenError> {
    let mut payload = Payload::new();
    payload.insert(claim_types::ISSUER.to_string(), Value::from(token.issuer.as_str()));
    payload.insert("nbf".to_string(), Value::from(token.creation_time.timestamp()));
    payload.insert("iat".to_string(), Value::from(token.creation_time.timestamp()));
    payload.insert("exp".to_string(), Value::from(token.expiry_time.timestamp()));

    for audience in &token.audiences {
        add_claim(&mut payload, claim_types::AUDIENCE, Value::from(audience.as_str()));
    }

    let mut amr = Vec::new();
    let mut scopes = Vec::new();
    let mut json = Vec::new();

    for claim in &token.claims {
        if claim.is(claim_types::AUTHENTICATION_METHOD) {
            amr.push(claim);
        } else if claim.is(claim_types::SCOPE) {
            scopes.push(claim);
        } else if let ClaimValue::Json(value) = &claim.value {
            json.push((claim.claim_type.as_str(), value));
        } else {
            add_claim(&mut payload, &claim.claim_type, claim.value.to_json());
        }
    }

    if !scopes.is_empty() {
        let values = scopes.iter().map(|c| c.value.to_json()).collect();
        payload.insert(claim_types::SCOPE.to_string(), Value::Array(values));
    }

    if !amr.is_empty() {
        let mut values: Vec<Value> = Vec::with_capacity(amr.len());
        for value in amr.iter().map(|c| c.value.to_json()) {
            if !values.contains(&value) {
                values.push(value);
            }
        }
        payload.insert(
            claim_types::AUTHENTICATION_METHOD.to_string(),
            Value::Array(values),
        );
    }

    merge_json_claims(&mut payload, &json)?;
    Ok(payload)
}

/// Add a claim, turning a repeated key into an array.
fn add_claim(payload: &mut Payload, claim_type: &str, value: Value) {
    match payload.get_mut(claim_type) {
        None => {
            payload.insert(claim_type.to_string(), value);
        }
        Some(Value::Array(existing)) => existing.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

enum Shape {
    Objects,
    Arrays,
}

fn merge_json_claims(payload: &mut Payload, claims: &[(&str, &Value)]) -> Result<(), TokenError> {
    let mut shaped = Vec::new();
    let mut unsupported = Vec::new();
    for (claim_type, values) in group_by_type(claims) {
        match shape_of(&values) {
            Some(shape) => shaped.push((claim_type, values, shape)),
            None => unsupported.push(claim_type.to_string()),
        }
    }
    if !unsupported.is_empty() {
        return Err(TokenError::UnsupportedClaimType {
            claim_types: unsupported,
        });
    }

    for (claim_type, values, shape) in shaped {
        if payload.contains_key(claim_type) {
            return Err(TokenError::claim_conflict(claim_type));
        }

        let merged = match shape {
            Shape::Objects if values.len() == 1 => values[0].clone(),
            Shape::Objects => Value::Array(values.into_iter().cloned().collect()),
            Shape::Arrays => Value::Array(
                values
                    .into_iter()
                    .filter_map(Value::as_array)
                    .flatten()
                    .cloned()
                    .collect(),
            ),
        };
        payload.insert(claim_type.to_string(), merged);
    }

    Ok(())
}

/// Group values by claim type, keeping first-seen order of types.
fn group_by_type<'a>(claims: &[(&'a str, &'a Value)]) -> Vec<(&'a str, Vec<&'a Value>)> {
    let mut groups: Vec<(&str, Vec<&Value>)> = Vec::new();
    for &(claim_type, value) in claims {
        match groups.iter_mut().find(|(t, _)| *t == claim_type) {
            Some((_, values)) => values.push(value),
            None => groups.push((claim_type, vec![value])),
        }
    }
    groups
}

fn shape_of(values: &[&Value]) -> Option<Shape> {
    if values.iter().all(|v| v.is_object()) {
        Some(Shape::Objects)
    } else if values.iter().all(|v| v.is_array()) {
        Some(Shape::Arrays)
    } else {
        None
    }
}
