//! Hand-rolled DER handling for cloud KMS responses.
//!
//! Both supported KMS providers return SPKI-encoded public keys and ASN.1
//! DER ECDSA signatures. The signatures carry no recovery id and are not
//! guaranteed to be low-S, so post-Homestead nodes would reject them as-is:
//! the conversion below is the part that makes KMS output usable on Ethereum.

use ethereum_types::{Address, Signature, U256};
use hex_literal::hex;

use crate::{recover_address, SignerError};

/// Order of the secp256k1 group.
const SECP256K1_ORDER: [u8; 32] =
    hex!("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141");

const SEQUENCE: u8 = 0x30;
const INTEGER: u8 = 0x02;
const BIT_STRING: u8 = 0x03;

struct DerReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> DerReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_byte(&mut self) -> Result<u8, SignerError> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or(SignerError::MalformedDer("unexpected end of input"))?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads a short- or long-form DER length.
    fn read_length(&mut self) -> Result<usize, SignerError> {
        let first = self.read_byte()?;
        if first < 0x80 {
            return Ok(first as usize);
        }
        let num_bytes = (first & 0x7f) as usize;
        if num_bytes == 0 || num_bytes > 2 {
            return Err(SignerError::MalformedDer("unsupported length encoding"));
        }
        let mut length = 0usize;
        for _ in 0..num_bytes {
            length = (length << 8) | self.read_byte()? as usize;
        }
        Ok(length)
    }

    fn expect_tag(&mut self, tag: u8) -> Result<usize, SignerError> {
        if self.read_byte()? != tag {
            return Err(SignerError::MalformedDer("unexpected tag"));
        }
        self.read_length()
    }

    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], SignerError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(SignerError::MalformedDer("length exceeds input"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

/// Extracts the uncompressed EC point from an SPKI document:
/// `SEQUENCE { AlgorithmIdentifier, BIT STRING }` where the bit string holds
/// `0x04 ‖ x ‖ y`.
pub fn public_key_from_spki(spki: &[u8]) -> Result<[u8; 65], SignerError> {
    let mut reader = DerReader::new(spki);

    reader.expect_tag(SEQUENCE)?;
    let algorithm_len = reader.expect_tag(SEQUENCE)?;
    reader.read_slice(algorithm_len)?;

    let bit_string_len = reader.expect_tag(BIT_STRING)?;
    let bit_string = reader.read_slice(bit_string_len)?;

    let (unused_bits, point) = bit_string
        .split_first()
        .ok_or(SignerError::MalformedDer("empty bit string"))?;
    if *unused_bits != 0 {
        return Err(SignerError::MalformedDer("bit string has unused bits"));
    }
    if point.len() != 65 || point[0] != 0x04 {
        return Err(SignerError::MalformedDer(
            "expected a 65-byte uncompressed EC point",
        ));
    }

    let mut out = [0u8; 65];
    out.copy_from_slice(point);
    Ok(out)
}

/// Parses `SEQUENCE { INTEGER r, INTEGER s }`, stripping sign padding and
/// left-padding each scalar to 32 bytes.
pub fn signature_from_der(der: &[u8]) -> Result<([u8; 32], [u8; 32]), SignerError> {
    let mut reader = DerReader::new(der);

    reader.expect_tag(SEQUENCE)?;
    let r = read_scalar(&mut reader)?;
    let s = read_scalar(&mut reader)?;

    Ok((r, s))
}

fn read_scalar(reader: &mut DerReader<'_>) -> Result<[u8; 32], SignerError> {
    let len = reader.expect_tag(INTEGER)?;
    let mut bytes = reader.read_slice(len)?;

    while let Some((&0, rest)) = bytes.split_first() {
        bytes = rest;
    }
    if bytes.len() > 32 {
        return Err(SignerError::MalformedDer("integer wider than 32 bytes"));
    }

    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}

/// Canonicalizes `s` to the lower half of the group order.
pub fn normalize_s(s: [u8; 32]) -> [u8; 32] {
    let order = U256::from_big_endian(&SECP256K1_ORDER);
    let value = U256::from_big_endian(&s);

    if value > order / 2 {
        (order - value).to_big_endian()
    } else {
        s
    }
}

/// Turns a DER-encoded KMS signature over `digest` into a 65-byte Ethereum
/// signature: low-S normalization followed by a recovery-id search against
/// the known signer address.
pub fn signature_from_kms(
    digest: [u8; 32],
    der: &[u8],
    address: Address,
) -> Result<Signature, SignerError> {
    let (r, s) = signature_from_der(der)?;
    let s = normalize_s(s);

    let mut candidate = [0u8; 65];
    candidate[..32].copy_from_slice(&r);
    candidate[32..64].copy_from_slice(&s);

    for v in [0u8, 1] {
        candidate[64] = v;
        let signature = Signature::from_slice(&candidate);
        if recover_address(&digest, &signature)
            .map(|recovered| recovered == address)
            .unwrap_or(false)
        {
            return Ok(signature);
        }
    }

    Err(SignerError::RecoveryFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalSigner;
    use keccak_hash::keccak;
    use secp256k1::{rand, Secp256k1, SECP256K1};

    /// Wraps an uncompressed point in a minimal SPKI document, the layout
    /// both KMS providers emit for secp256k1 keys.
    fn spki_from_point(point: &[u8; 65]) -> Vec<u8> {
        // AlgorithmIdentifier for id-ecPublicKey with the secp256k1 curve
        let algorithm = hex!("06072a8648ce3d020106052b8104000a");
        let mut spki = vec![SEQUENCE];
        let bit_string_len = 1 + point.len();
        let inner_len = 2 + algorithm.len() + 2 + bit_string_len;
        spki.push(inner_len as u8);
        spki.push(SEQUENCE);
        spki.push(algorithm.len() as u8);
        spki.extend_from_slice(&algorithm);
        spki.push(BIT_STRING);
        spki.push(bit_string_len as u8);
        spki.push(0x00);
        spki.extend_from_slice(point);
        spki
    }

    /// DER-encodes an (r, s) pair the way an ECDSA oracle would, including
    /// the 0x00 sign-padding byte when the scalar's high bit is set.
    fn der_from_scalars(r: &[u8; 32], s: &[u8; 32]) -> Vec<u8> {
        fn integer(scalar: &[u8; 32]) -> Vec<u8> {
            let mut bytes = scalar.as_slice();
            while let Some((&0, rest)) = bytes.split_first() {
                bytes = rest;
            }
            let pad = bytes.first().is_some_and(|b| *b >= 0x80);
            let mut out = vec![INTEGER, (bytes.len() + usize::from(pad)) as u8];
            if pad {
                out.push(0x00);
            }
            out.extend_from_slice(bytes);
            out
        }

        let r = integer(r);
        let s = integer(s);
        let mut der = vec![SEQUENCE, (r.len() + s.len()) as u8];
        der.extend_from_slice(&r);
        der.extend_from_slice(&s);
        der
    }

    #[test]
    fn parses_spki_point_and_derives_address() {
        let (secret_key, public_key) = Secp256k1::new().generate_keypair(&mut rand::thread_rng());
        let point = public_key.serialize_uncompressed();
        let spki = spki_from_point(&point);

        let parsed = public_key_from_spki(&spki).unwrap();
        assert_eq!(parsed, point);

        let address = Address::from(keccak(&parsed[1..]));
        assert_eq!(address, LocalSigner::new(secret_key).address);
    }

    #[test]
    fn rejects_truncated_spki() {
        let (_, public_key) = Secp256k1::new().generate_keypair(&mut rand::thread_rng());
        let spki = spki_from_point(&public_key.serialize_uncompressed());
        assert!(public_key_from_spki(&spki[..spki.len() - 1]).is_err());
    }

    #[test]
    fn der_parse_strips_sign_padding() {
        let r = {
            let mut r = [0u8; 32];
            r[0] = 0x80; // forces a sign-padding byte in DER
            r[31] = 0x01;
            r
        };
        let s = {
            let mut s = [0u8; 32];
            s[31] = 0x02;
            s
        };

        let der = der_from_scalars(&r, &s);
        let (parsed_r, parsed_s) = signature_from_der(&der).unwrap();
        assert_eq!(parsed_r, r);
        assert_eq!(parsed_s, s);
    }

    #[test]
    fn normalize_s_flips_high_values() {
        let order = U256::from_big_endian(&SECP256K1_ORDER);

        let low = U256::from(5u64).to_big_endian();
        assert_eq!(normalize_s(low), low);

        let high = (order - U256::from(5u64)).to_big_endian();
        assert_eq!(normalize_s(high), low);
    }

    #[test]
    fn kms_signature_with_high_s_recovers_signer() {
        // produce a signature locally, then re-encode it the way a KMS
        // oracle would: DER, high-S, no recovery id
        let (secret_key, _) = Secp256k1::new().generate_keypair(&mut rand::thread_rng());
        let signer = LocalSigner::new(secret_key);
        let digest = keccak(b"kms fixup").0;

        let signature = signer.sign_digest(digest);
        let r: [u8; 32] = signature[..32].try_into().unwrap();
        let s: [u8; 32] = signature[32..64].try_into().unwrap();

        // flip s to the high half of the order
        let order = U256::from_big_endian(&SECP256K1_ORDER);
        let high_s = (order - U256::from_big_endian(&s)).to_big_endian();

        let der = der_from_scalars(&r, &high_s);
        let fixed = signature_from_kms(digest, &der, signer.address).unwrap();

        // low-S restored and the recovery id found by trial
        assert_eq!(&fixed[32..64], &s);
        assert_eq!(recover_address(&digest, &fixed).unwrap(), signer.address);

        // secp256k1 itself must accept the compact signature
        let recovery_id = secp256k1::ecdsa::RecoveryId::from_i32(fixed[64] as i32).unwrap();
        let recoverable =
            secp256k1::ecdsa::RecoverableSignature::from_compact(&fixed[..64], recovery_id)
                .unwrap();
        let message = secp256k1::Message::from_digest(digest);
        let recovered = SECP256K1.recover_ecdsa(&message, &recoverable).unwrap();
        assert_eq!(
            Address::from(keccak(&recovered.serialize_uncompressed()[1..])),
            signer.address
        );
    }
}
