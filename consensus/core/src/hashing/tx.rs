use crate::tx::Transaction;
use crate::Hash;
use borsh::BorshSerialize;
use crypto_hashes::HashWriter;

/// Computes the transaction id: double SHA256 over the borsh encoding of every
/// field except the cached id itself.
pub fn id(tx: &Transaction) -> Hash {
    let mut writer = HashWriter::new();
    write_tx(tx, &mut writer).expect("writing to a hasher never fails");
    writer.finalize_double()
}

fn write_tx(tx: &Transaction, writer: &mut HashWriter) -> std::io::Result<()> {
    tx.version.serialize(writer)?;
    tx.tx_type.serialize(writer)?;
    tx.inputs.serialize(writer)?;
    tx.outputs.serialize(writer)?;
    tx.lock_time.serialize(writer)?;
    tx.payload.serialize(writer)
}
