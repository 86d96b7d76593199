//! Payment hand-off for buy orders: what the customer's wallet needs to pay the desk.
use thiserror::Error;

use nub_types::api::PaymentInstructions;
use nub_types::models::CryptoCurrency;

const GWEI: u128 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("No {0} wallet is configured")]
    WalletNotConfigured(CryptoCurrency),
}

/// Wei amount for `eth`, truncated to whole gwei so the float never leaks into the integer part.
pub fn eth_to_wei_hex(eth: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let gwei = (eth.max(0.0) * 1e9).floor() as u128;
    format!("0x{:x}", gwei * GWEI)
}

fn uri_amount(amount: f64) -> String {
    let s = format!("{amount:.8}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

pub fn payment_request(
    currency: CryptoCurrency,
    address: &str,
    amount: f64,
) -> Result<PaymentInstructions, PaymentError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(PaymentError::WalletNotConfigured(currency));
    }
    let to = address.to_string();
    Ok(match currency {
        CryptoCurrency::Eth => PaymentInstructions::EthTransaction {
            to,
            value_wei: eth_to_wei_hex(amount),
        },
        CryptoCurrency::Btc => PaymentInstructions::Uri {
            uri: format!("bitcoin:{to}?amount={}", uri_amount(amount)),
        },
        CryptoCurrency::Ltc => PaymentInstructions::Uri {
            uri: format!("litecoin:{to}?amount={}", uri_amount(amount)),
        },
        CryptoCurrency::Usdt => PaymentInstructions::Manual { address: to },
    })
}
