// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ABI of the Safe and its recovery module.

use alloy::sol;

sol! {
    interface IGnosisSafe {
        function getModules() external view returns (address[] memory);
    }
}

sol! {
    interface IRecoveryModule {
        function recoverer() external view returns (address);
        function nonce() external view returns (uint256);
        function delay() external view returns (uint256);

        function triggerRecovery(bytes32 r, bytes32 s, uint8 v, address[] calldata recoveryOwners) external;
        function executeRecovery() external;
        function triggerAndExecuteRecoveryWithoutDelay(bytes32 r, bytes32 s, uint8 v, address[] calldata recoveryOwners) external;
    }
}
