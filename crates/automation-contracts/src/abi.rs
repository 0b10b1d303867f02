//! Solidity interfaces for the contracts the catalog drives.
//!
//! Only the functions the CLI calls are declared. Constructor arguments are
//! ABI-encoded as parameter tuples and appended to the artifact bytecode.

use alloy_sol_types::sol;

sol! {
    interface ILinkToken {
        function grantMintRole(address minter) external;
        function mint(address account, uint256 amount) external;
        function transfer(address to, uint256 value) external returns (bool);
        function balanceOf(address owner) external view returns (uint256);
    }

    interface IAggregator {
        function decimals() external view returns (uint8);
        function latestAnswer() external view returns (int256);
    }

    struct OnchainConfigV21 {
        uint32 paymentPremiumPPB;
        uint32 flatFeeMicroLink;
        uint32 checkGasLimit;
        uint24 stalenessSeconds;
        uint16 gasCeilingMultiplier;
        uint96 minUpkeepSpend;
        uint32 maxPerformGas;
        uint32 maxCheckDataSize;
        uint32 maxPerformDataSize;
        uint32 maxRevertDataSize;
        uint256 fallbackGasPrice;
        uint256 fallbackLinkPrice;
        address transcoder;
        address[] registrars;
        address upkeepPrivilegeManager;
    }

    interface IKeeperRegistry {
        function setConfigTypeSafe(
            address[] signers,
            address[] transmitters,
            uint8 f,
            OnchainConfigV21 onchainConfig,
            uint64 offchainConfigVersion,
            bytes offchainConfig
        ) external;
        function typeAndVersion() external view returns (string);
    }

    struct InitialTriggerConfig {
        uint8 triggerType;
        uint8 autoApproveType;
        uint32 autoApproveMaxAllowed;
    }

    struct LogTriggerConfig {
        address contractAddress;
        uint8 filterSelector;
        bytes32 topic0;
        bytes32 topic1;
        bytes32 topic2;
        bytes32 topic3;
    }

    interface IVerifiableLoad {
        function batchRegisterUpkeeps(
            uint8 number,
            uint32 gasLimit,
            uint8 triggerType,
            bytes triggerConfig,
            uint96 amount,
            uint256 checkGasToBurn,
            uint256 performGasToBurn
        ) external;
        function batchCancelUpkeeps(uint256[] upkeepIds) external;
        function batchSetIntervals(uint256[] upkeepIds, uint32 interval) external;
        function getActiveUpkeepIDsDeployedByThisContract(uint256 startIndex, uint256 maxCount)
            external view returns (uint256[]);
        function counters(uint256 upkeepId) external view returns (uint256);
        function getPxDelayLastNPerforms(uint256 upkeepId, uint256 p, uint256 n)
            external view returns (uint256);

        event LogEmitted(uint256 indexed upkeepId, uint256 indexed blockNum, address indexed addr);
    }
}
