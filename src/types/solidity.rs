//! Solidity struct definitions for EIP-712 signing.
//!
//! `Agent` is the phantom-agent wrapper used by every L1 action: the
//! canonical action hash rides in `connectionId`. The remaining structs are
//! the primary types of the user-signed actions; their on-wire primary type
//! names are these struct names prefixed with `HyperliquidTransaction:`.

use alloy::sol;

sol! {
    struct Agent {
        string source;
        bytes32 connectionId;
    }

    struct UsdSend {
        string hyperliquidChain;
        string destination;
        string amount;
        uint64 time;
    }

    struct SpotSend {
        string hyperliquidChain;
        string destination;
        string token;
        string amount;
        uint64 time;
    }

    struct Withdraw {
        string hyperliquidChain;
        string destination;
        string amount;
        uint64 time;
    }

    struct UsdClassTransfer {
        string hyperliquidChain;
        string amount;
        bool toPerp;
        uint64 nonce;
    }

    struct ApproveAgent {
        string hyperliquidChain;
        address agentAddress;
        string agentName;
        uint64 nonce;
    }

    struct ApproveBuilderFee {
        string hyperliquidChain;
        string maxFeeRate;
        address builder;
        uint64 nonce;
    }

    struct ConvertToMultiSigUser {
        string hyperliquidChain;
        string signers;
        uint64 nonce;
    }
}
