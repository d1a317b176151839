//! Message processing models.
//!
//! The v1 and v2c models delegate to their community security models,
//! which build and check the `SEQUENCE { version, community, pdu }`
//! envelope. The v3 model reads the security model number from
//! `msgGlobalData` and hands the whole datagram to whichever security
//! model the dispatcher resolves — USM in the default set.

use bytes::Bytes;

use crate::creds::{Credentials, security_model};
use crate::dispatch::{MessageProcessingModel, SecurityContext, SecurityModel};
use crate::error::{EncodeErrorKind, Error, Result};
use crate::message::{CommunityMessage, Version};
use crate::pdu::Pdu;

/// SNMPv1 message processing model (version 0).
pub struct V1Mpm;

impl MessageProcessingModel for V1Mpm {
    fn identifier(&self) -> i32 {
        0
    }

    fn prepare_outgoing(&self, pdu: &Pdu, ctx: &SecurityContext<'_>) -> Result<Bytes> {
        ctx.dispatcher
            .security_model(security_model::V1)?
            .generate_request(pdu, ctx)
    }

    fn process_incoming(&self, data: Bytes, ctx: &SecurityContext<'_>) -> Result<Pdu> {
        ctx.dispatcher
            .security_model(security_model::V1)?
            .process_response(data, ctx)
    }
}

/// SNMPv2c message processing model (version 1).
pub struct V2cMpm;

impl MessageProcessingModel for V2cMpm {
    fn identifier(&self) -> i32 {
        1
    }

    fn prepare_outgoing(&self, pdu: &Pdu, ctx: &SecurityContext<'_>) -> Result<Bytes> {
        ctx.dispatcher
            .security_model(security_model::V2C)?
            .generate_request(pdu, ctx)
    }

    fn process_incoming(&self, data: Bytes, ctx: &SecurityContext<'_>) -> Result<Pdu> {
        ctx.dispatcher
            .security_model(security_model::V2C)?
            .process_response(data, ctx)
    }
}

/// SNMPv3 message processing model (version 3).
pub struct V3Mpm;

impl MessageProcessingModel for V3Mpm {
    fn identifier(&self) -> i32 {
        3
    }

    fn prepare_outgoing(&self, pdu: &Pdu, ctx: &SecurityContext<'_>) -> Result<Bytes> {
        let model_id = ctx.credentials.security_model_id();
        ctx.dispatcher
            .security_model(model_id)?
            .generate_request(pdu, ctx)
    }

    fn process_incoming(&self, data: Bytes, ctx: &SecurityContext<'_>) -> Result<Pdu> {
        // The incoming message names its own security model; honor it.
        let msg = crate::message::V3Message::decode(data.clone())?;
        ctx.dispatcher
            .security_model(msg.global_data.msg_security_model)?
            .process_response(data, ctx)
    }
}

/// Shared implementation for the two community security models.
fn community_request(version: Version, pdu: &Pdu, ctx: &SecurityContext<'_>) -> Result<Bytes> {
    let community = ctx
        .credentials
        .community()
        .ok_or(Error::encode(EncodeErrorKind::IncompatibleCredentials))?;
    Ok(CommunityMessage::new(version, community.clone(), pdu.clone()).encode())
}

fn community_response(version: Version, data: Bytes, ctx: &SecurityContext<'_>) -> Result<Pdu> {
    let msg = CommunityMessage::decode(data)?;
    if msg.version != version {
        return Err(Error::UnexpectedResponse {
            reason: "response version does not match request",
        });
    }
    if let Some(community) = ctx.credentials.community()
        && msg.community != *community
    {
        tracing::warn!(
            target: "snmpkit::mpm",
            "response community does not match request"
        );
        return Err(Error::UnexpectedResponse {
            reason: "response community does not match request",
        });
    }
    Ok(msg.into_pdu())
}

/// SNMPv1 community security model (id 1).
pub struct CommunityV1;

impl SecurityModel for CommunityV1 {
    fn identifier(&self) -> i32 {
        security_model::V1
    }

    fn generate_request(&self, pdu: &Pdu, ctx: &SecurityContext<'_>) -> Result<Bytes> {
        community_request(Version::V1, pdu, ctx)
    }

    fn process_response(&self, data: Bytes, ctx: &SecurityContext<'_>) -> Result<Pdu> {
        community_response(Version::V1, data, ctx)
    }
}

/// SNMPv2c community security model (id 2).
pub struct CommunityV2c;

impl SecurityModel for CommunityV2c {
    fn identifier(&self) -> i32 {
        security_model::V2C
    }

    fn generate_request(&self, pdu: &Pdu, ctx: &SecurityContext<'_>) -> Result<Bytes> {
        community_request(Version::V2c, pdu, ctx)
    }

    fn process_response(&self, data: Bytes, ctx: &SecurityContext<'_>) -> Result<Pdu> {
        community_response(Version::V2c, data, ctx)
    }
}

/// Resolve the MPM for the given credentials and serialize a request.
pub fn encode_request(pdu: &Pdu, ctx: &SecurityContext<'_>) -> Result<Bytes> {
    let mpm = ctx.dispatcher.mpm(ctx.credentials.mpm_id())?;
    mpm.prepare_outgoing(pdu, ctx)
}

/// Resolve the MPM for the given credentials and open a response.
pub fn decode_response(data: Bytes, ctx: &SecurityContext<'_>) -> Result<Pdu> {
    let mpm = ctx.dispatcher.mpm(ctx.credentials.mpm_id())?;
    mpm.process_incoming(data, ctx)
}
