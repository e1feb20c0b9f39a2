//! SwapRouter02 calldata
//!
//! SwapRouter02's `exactInputSingle` has no deadline field, so the call is
//! wrapped in `multicall(deadline, [..])`.

use alloy::primitives::{aliases::U24, Bytes, U160, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

use super::SwapParams;

sol! {
    #[derive(Debug)]
    struct ExactInputSingleParams {
        address tokenIn;
        address tokenOut;
        uint24 fee;
        address recipient;
        uint256 amountIn;
        uint256 amountOutMinimum;
        uint160 sqrtPriceLimitX96;
    }

    #[derive(Debug)]
    function exactInputSingle(ExactInputSingleParams calldata params)
        external
        payable
        returns (uint256 amountOut);

    #[derive(Debug)]
    function multicall(uint256 deadline, bytes[] calldata data)
        external
        payable
        returns (bytes[] memory results);
}

pub fn build_exact_input_single(params: &SwapParams) -> Bytes {
    let inner = exactInputSingleCall {
        params: ExactInputSingleParams {
            tokenIn: params.hop.token_in.address,
            tokenOut: params.hop.token_out.address,
            fee: U24::from(params.hop.fee),
            recipient: params.recipient,
            amountIn: params.amount_in,
            amountOutMinimum: params.amount_out_min,
            sqrtPriceLimitX96: U160::ZERO,
        },
    };

    let call = multicallCall {
        deadline: U256::from(params.deadline),
        data: vec![Bytes::from(inner.abi_encode())],
    };
    Bytes::from(call.abi_encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Hop;
    use crate::testing::{usdc, weth};
    use alloy::primitives::Address;

    #[test]
    fn test_swap_is_wrapped_in_deadline_multicall() {
        let params = SwapParams {
            hop: Hop { token_in: weth(), token_out: usdc(), fee: 500 },
            amount_in: U256::from(10_000_000_000_000_000u128),
            amount_out_min: U256::from(20_994_500u64),
            recipient: Address::repeat_byte(0x11),
            deadline: 1_700_000_060,
        };

        let calldata = build_exact_input_single(&params);
        assert_eq!(&calldata[..4], multicallCall::SELECTOR.as_slice());

        let outer = multicallCall::abi_decode(&calldata).unwrap();
        assert_eq!(outer.deadline, U256::from(1_700_000_060u64));
        assert_eq!(outer.data.len(), 1);

        let inner = exactInputSingleCall::abi_decode(&outer.data[0]).unwrap();
        assert_eq!(inner.params.tokenIn, weth().address);
        assert_eq!(inner.params.tokenOut, usdc().address);
        assert_eq!(inner.params.fee, U24::from(500u32));
        assert_eq!(inner.params.amountOutMinimum, U256::from(20_994_500u64));
        assert_eq!(inner.params.recipient, Address::repeat_byte(0x11));
    }
}
