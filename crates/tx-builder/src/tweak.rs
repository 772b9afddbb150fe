//! Taproot key-path tweaking of private keys.

use bitcoin::{
    XOnlyPublicKey,
    key::{TapTweak, TweakedPublicKey},
    secp256k1::{Parity, Secp256k1, SecretKey, Signing, Verification},
    taproot::{TapNodeHash, TapTweakHash},
};

/// Tweaks `sk` for a key-path spend of an output with the given merkle root.
///
/// The key is negated first when its public point has odd Y, so the result
/// signs for the x-only output key.
pub fn tweak_secret_key<C: Signing + Verification>(
    secp: &Secp256k1<C>,
    sk: &SecretKey,
    merkle_root: Option<TapNodeHash>,
) -> Result<SecretKey, bitcoin::secp256k1::Error> {
    let (internal_key, parity) = sk.x_only_public_key(secp);
    let tweak = TapTweakHash::from_key_and_tweak(internal_key, merkle_root).to_scalar();
    let even = match parity {
        Parity::Odd => sk.negate(),
        Parity::Even => *sk,
    };
    even.add_tweak(&tweak)
}

/// Computes the output key a tweaked key signs for.
pub fn tweaked_output_key<C: Verification>(
    secp: &Secp256k1<C>,
    internal_key: XOnlyPublicKey,
    merkle_root: Option<TapNodeHash>,
) -> TweakedPublicKey {
    let (tweaked, _) = internal_key.tap_tweak(secp, merkle_root);
    tweaked
}
