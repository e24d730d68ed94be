//! Payment selection.
//!
//! Given the requirements a server offers and one signer's declared options, pick the
//! single requirement to pay. Candidates are ranked by the option's priority first and
//! by amount second, so a caller can prefer a cheaper chain and still get the cheapest
//! offer on it.

use crate::errors::{Result, X402Error};
use crate::signers::PaymentSigner;
use crate::types::PaymentRequirements;
use crate::utils::parse_amount;
use tracing::debug;

/// A requirement that survived filtering, with its sort keys.
#[derive(Debug)]
struct Candidate<'a> {
    requirement: &'a PaymentRequirements,
    priority: i32,
    amount: u128,
}

/// Picks the requirement `signer` should pay.
///
/// A requirement is discarded when the signer has no option for its (network, asset),
/// the option's scheme differs, the amount is not a positive integer, or the amount
/// exceeds the option's `max_amount`. Survivors are ordered by (priority, amount); the
/// sort is stable so exact ties keep the server's order.
///
/// Returns [`X402Error::NoAcceptablePayment`] if nothing survives.
pub fn select_payment(
    signer: &dyn PaymentSigner,
    requirements: &[PaymentRequirements],
) -> Result<PaymentRequirements> {
    let mut candidates: Vec<Candidate<'_>> = requirements
        .iter()
        .filter_map(|requirement| evaluate(signer, requirement))
        .collect();

    candidates.sort_by_key(|c| (c.priority, c.amount));

    candidates
        .first()
        .map(|c| c.requirement.clone())
        .ok_or_else(|| {
            X402Error::NoAcceptablePayment(format!(
                "signer {} matches none of {} offered requirement(s)",
                signer.address(),
                requirements.len()
            ))
        })
}

fn evaluate<'a>(
    signer: &dyn PaymentSigner,
    requirement: &'a PaymentRequirements,
) -> Option<Candidate<'a>> {
    let Some(option) = signer.payment_option(&requirement.network, &requirement.asset) else {
        debug!(
            network = %requirement.network,
            asset = %requirement.asset,
            "no option for requirement"
        );
        return None;
    };

    if option.scheme != requirement.scheme {
        debug!(
            offered = %requirement.scheme,
            declared = %option.scheme,
            "scheme mismatch"
        );
        return None;
    }

    let amount = match requirement.amount() {
        Ok(amount) => amount,
        Err(e) => {
            debug!(amount = %requirement.max_amount_required, error = %e, "unusable amount");
            return None;
        }
    };

    if let Some(ceiling) = &option.max_amount {
        match parse_amount(ceiling) {
            Ok(ceiling) if amount > ceiling => {
                debug!(amount, ceiling, "amount over option ceiling");
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                debug!(ceiling = %ceiling, error = %e, "unusable option ceiling");
                return None;
            }
        }
    }

    Some(Candidate {
        requirement,
        priority: option.priority,
        amount,
    })
}
