// SPDX-License-Identifier: Apache-2.0
// Quarry - Supply Chain Dependency Graph Engine
// Copyright (C) 2026 The Quarry Authors

//! Mapping from the engine's error taxonomy to gRPC status codes.
//!
//! Each error kind maps to exactly one code, so clients can dispatch on the
//! code alone; the message carries the enriched detail string.

use quarry_core::GraphError;
use tonic::Status;

/// Convert an engine error into the one status code its kind maps to.
pub fn to_status(err: GraphError) -> Status {
    let message = err.to_string();
    match err {
        GraphError::NotFound(_) | GraphError::UnknownNode(_) => Status::not_found(message),
        GraphError::AlreadyExists(_) => Status::already_exists(message),
        GraphError::InvalidArgument(_) | GraphError::Parse { .. } => {
            Status::invalid_argument(message)
        }
        GraphError::NotCached => Status::failed_precondition(message),
        GraphError::Storage(_) => Status::unavailable(message),
        GraphError::Cancelled => Status::cancelled(message),
        GraphError::Internal(_) => Status::internal(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_every_kind_has_a_single_code() {
        let cases = [
            (GraphError::NotFound("x".into()), Code::NotFound),
            (GraphError::UnknownNode("x".into()), Code::NotFound),
            (GraphError::AlreadyExists("x".into()), Code::AlreadyExists),
            (GraphError::InvalidArgument("x".into()), Code::InvalidArgument),
            (GraphError::parse(0, "x"), Code::InvalidArgument),
            (GraphError::NotCached, Code::FailedPrecondition),
            (GraphError::Storage("x".into()), Code::Unavailable),
            (GraphError::Cancelled, Code::Cancelled),
            (GraphError::Internal("x".into()), Code::Internal),
        ];
        for (err, code) in cases {
            assert_eq!(to_status(err).code(), code);
        }
    }

    #[test]
    fn test_message_carries_detail() {
        let status = to_status(GraphError::parse(12, "expected operator"));
        assert!(status.message().contains("byte 12"));
    }
}
