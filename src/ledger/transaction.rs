//! Transaction wire format: instruction compilation, message layout, signing.
//!
//! # Layout
//! ```text
//! transaction = compact_u16(n) signature*n message
//! message     = header(3 bytes) compact_u16(k) pubkey*k blockhash
//!               compact_u16(i) instruction*i
//! instruction = program_index(u8) compact_u16(a) account_index*a
//!               compact_u16(d) data
//! ```
//!
//! Account keys are ordered writable signers, read-only signers, writable
//! non-signers, read-only non-signers, with the fee payer always first.

use crate::ledger::types::{Hash, LedgerError, LedgerResult, Pubkey, Signature};
use crate::ledger::wallet::SigningAgent;

/// One account an instruction touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(pubkey: Pubkey, is_signer: bool) -> Self {
        Self { pubkey, is_signer, is_writable: true }
    }

    pub fn readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self { pubkey, is_signer, is_writable: false }
    }
}

/// A program call before compilation into a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

/// Instruction with accounts replaced by indices into the message key table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

/// The signed portion of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: Hash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compile instructions into a message paid for by `payer`.
    pub fn compile(instructions: &[Instruction], payer: &Pubkey, recent_blockhash: Hash) -> LedgerResult<Self> {
        // (key, is_signer, is_writable) in first-seen order, payer first
        let mut keys: Vec<(Pubkey, bool, bool)> = vec![(*payer, true, true)];
        let mut merge = |pubkey: Pubkey, is_signer: bool, is_writable: bool| {
            match keys.iter_mut().find(|(k, _, _)| *k == pubkey) {
                Some(entry) => {
                    entry.1 |= is_signer;
                    entry.2 |= is_writable;
                }
                None => keys.push((pubkey, is_signer, is_writable)),
            }
        };
        for ix in instructions {
            for meta in &ix.accounts {
                merge(meta.pubkey, meta.is_signer, meta.is_writable);
            }
            merge(ix.program_id, false, false);
        }

        // Stable sort keeps the payer at index 0.
        keys.sort_by_key(|(_, is_signer, is_writable)| (!is_signer, !is_writable));

        if keys.len() > u8::MAX as usize + 1 {
            return Err(LedgerError::InvalidTransaction(format!(
                "message references {} accounts",
                keys.len()
            )));
        }

        let count = |signer: bool, writable: bool| {
            keys.iter().filter(|(_, s, w)| *s == signer && *w == writable).count() as u8
        };
        let header = MessageHeader {
            num_required_signatures: count(true, true) + count(true, false),
            num_readonly_signed_accounts: count(true, false),
            num_readonly_unsigned_accounts: count(false, false),
        };

        let account_keys: Vec<Pubkey> = keys.into_iter().map(|(k, _, _)| k).collect();
        let index_of = |pubkey: &Pubkey| -> u8 {
            // Every key was inserted above and the table fits in u8.
            account_keys.iter().position(|k| k == pubkey).unwrap_or(0) as u8
        };

        let compiled = instructions
            .iter()
            .map(|ix| CompiledInstruction {
                program_id_index: index_of(&ix.program_id),
                accounts: ix.accounts.iter().map(|m| index_of(&m.pubkey)).collect(),
                data: ix.data.clone(),
            })
            .collect();

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions: compiled,
        })
    }

    /// Fee payer (first key).
    pub fn payer(&self) -> Option<&Pubkey> {
        self.account_keys.first()
    }

    pub fn is_signer(&self, index: usize) -> bool {
        index < self.header.num_required_signatures as usize
    }

    pub fn is_writable(&self, index: usize) -> bool {
        let signed = self.header.num_required_signatures as usize;
        let total = self.account_keys.len();
        if index < signed {
            index < signed - self.header.num_readonly_signed_accounts as usize
        } else {
            index < total - self.header.num_readonly_unsigned_accounts as usize
        }
    }

    /// Resolve a compiled instruction back to program id and account keys.
    pub fn resolve(&self, ix: &CompiledInstruction) -> Option<(Pubkey, Vec<Pubkey>)> {
        let program_id = *self.account_keys.get(ix.program_id_index as usize)?;
        let accounts = ix
            .accounts
            .iter()
            .map(|i| self.account_keys.get(*i as usize).copied())
            .collect::<Option<Vec<_>>>()?;
        Some((program_id, accounts))
    }

    /// Wire encoding of the message (the bytes that get signed).
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);
        buf.push(self.header.num_required_signatures);
        buf.push(self.header.num_readonly_signed_accounts);
        buf.push(self.header.num_readonly_unsigned_accounts);

        encode_compact_u16(&mut buf, self.account_keys.len());
        for key in &self.account_keys {
            buf.extend_from_slice(key.as_bytes());
        }
        buf.extend_from_slice(self.recent_blockhash.as_bytes());

        encode_compact_u16(&mut buf, self.instructions.len());
        for ix in &self.instructions {
            buf.push(ix.program_id_index);
            encode_compact_u16(&mut buf, ix.accounts.len());
            buf.extend_from_slice(&ix.accounts);
            encode_compact_u16(&mut buf, ix.data.len());
            buf.extend_from_slice(&ix.data);
        }
        buf
    }
}

/// A message plus the signatures authorizing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub signatures: Vec<Signature>,
    pub message: Message,
}

impl Transaction {
    /// Have `agent` sign `message`. The agent must be the only required signer.
    pub async fn sign(message: Message, agent: &dyn SigningAgent) -> LedgerResult<Self> {
        if message.header.num_required_signatures != 1 || message.payer() != Some(&agent.pubkey()) {
            return Err(LedgerError::Signing(format!(
                "message needs {} signature(s) and is paid by {:?}; agent is {}",
                message.header.num_required_signatures,
                message.payer(),
                agent.pubkey()
            )));
        }
        let signature = agent.sign_message(&message.serialize()).await?;
        Ok(Self {
            signatures: vec![signature],
            message,
        })
    }

    /// First signature; identifies the transaction on the ledger.
    pub fn signature(&self) -> Option<&Signature> {
        self.signatures.first()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        encode_compact_u16(&mut buf, self.signatures.len());
        for sig in &self.signatures {
            buf.extend_from_slice(sig.as_bytes());
        }
        buf.extend_from_slice(&self.message.serialize());
        buf
    }
}

/// Variable-length u16: 7 bits per byte, high bit set on all but the last.
fn encode_compact_u16(buf: &mut Vec<u8>, mut len: usize) {
    loop {
        let mut byte = (len & 0x7f) as u8;
        len >>= 7;
        if len == 0 {
            buf.push(byte);
            return;
        }
        byte |= 0x80;
        buf.push(byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::SYSTEM_PROGRAM_ID;
    use crate::ledger::wallet::LocalKeypair;

    fn key(n: u8) -> Pubkey {
        Pubkey([n; 32])
    }

    fn sample_instruction(payer: Pubkey) -> Instruction {
        Instruction {
            program_id: key(9),
            accounts: vec![
                AccountMeta::writable(key(5), false),
                AccountMeta::writable(payer, true),
                AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
            ],
            data: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_compact_u16() {
        let mut buf = Vec::new();
        encode_compact_u16(&mut buf, 0x7f);
        assert_eq!(buf, vec![0x7f]);

        buf.clear();
        encode_compact_u16(&mut buf, 0x80);
        assert_eq!(buf, vec![0x80, 0x01]);

        buf.clear();
        encode_compact_u16(&mut buf, 0x3fff);
        assert_eq!(buf, vec![0xff, 0x7f]);
    }

    #[test]
    fn test_key_ordering_and_header() {
        let payer = key(1);
        let message = Message::compile(&[sample_instruction(payer)], &payer, Hash([0xAA; 32])).unwrap();

        // payer, campaign (writable), then read-only system program and program id
        assert_eq!(message.account_keys, vec![payer, key(5), SYSTEM_PROGRAM_ID, key(9)]);
        assert_eq!(
            message.header,
            MessageHeader {
                num_required_signatures: 1,
                num_readonly_signed_accounts: 0,
                num_readonly_unsigned_accounts: 2,
            }
        );
        assert_eq!(message.instructions[0].program_id_index, 3);
        assert_eq!(message.instructions[0].accounts, vec![1, 0, 2]);

        assert!(message.is_signer(0));
        assert!(!message.is_signer(1));
        assert!(message.is_writable(0));
        assert!(message.is_writable(1));
        assert!(!message.is_writable(2));
        assert!(!message.is_writable(3));
    }

    #[test]
    fn test_resolve_roundtrip() {
        let payer = key(1);
        let ix = sample_instruction(payer);
        let message = Message::compile(&[ix.clone()], &payer, Hash::default()).unwrap();
        let (program_id, accounts) = message.resolve(&message.instructions[0]).unwrap();
        assert_eq!(program_id, ix.program_id);
        assert_eq!(accounts, ix.accounts.iter().map(|m| m.pubkey).collect::<Vec<_>>());
    }

    #[test]
    fn test_message_bytes() {
        let payer = key(1);
        let message = Message::compile(&[sample_instruction(payer)], &payer, Hash([0xAA; 32])).unwrap();
        let bytes = message.serialize();

        assert_eq!(&bytes[..4], &[1, 0, 2, 4]);
        assert_eq!(&bytes[4..36], &[1u8; 32]);
        let blockhash_at = 4 + 4 * 32;
        assert_eq!(&bytes[blockhash_at..blockhash_at + 32], &[0xAA; 32]);
        // one instruction: program 3, accounts [1,0,2], data [1,2,3]
        assert_eq!(&bytes[blockhash_at + 32..], &[1, 3, 3, 1, 0, 2, 3, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_sign_prefixes_signature() {
        let agent = LocalKeypair::from_seed([4u8; 32]);
        let payer = agent.pubkey();
        let message = Message::compile(&[sample_instruction(payer)], &payer, Hash::default()).unwrap();
        let tx = Transaction::sign(message.clone(), &agent).await.unwrap();

        let bytes = tx.serialize();
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..65], tx.signature().unwrap().as_bytes());
        assert_eq!(&bytes[65..], message.serialize().as_slice());
    }

    #[tokio::test]
    async fn test_sign_rejects_foreign_payer() {
        let agent = LocalKeypair::from_seed([4u8; 32]);
        let payer = key(1);
        let message = Message::compile(&[sample_instruction(payer)], &payer, Hash::default()).unwrap();
        let result = Transaction::sign(message, &agent).await;
        assert!(matches!(result, Err(LedgerError::Signing(_))));
    }
}
