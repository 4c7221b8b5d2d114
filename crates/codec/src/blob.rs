use crate::CodecError;
use alloy_eips::eip4844::{Blob, BYTES_PER_BLOB};

/// The maximum number of data bytes which can be stored in a single blob.
pub const BLOB_MAX_DATA_SIZE: usize = (4 * 31 + 3) * BLOB_ENCODING_ROUNDS - 4;

/// The encoding version stored in the first field element of a blob.
const BLOB_ENCODING_VERSION: u8 = 0;

/// The number of 4 field element rounds in a blob.
const BLOB_ENCODING_ROUNDS: usize = 1024;

/// Decodes the data packed into a blob.
///
/// Each round packs 127 bytes of data in 4 field elements: the first 31 bytes of every field
/// element hold data verbatim and the 6 free bits of the leading bytes hold the remaining 3 bytes.
/// The first field element additionally carries the encoding version and the 3 bytes big-endian
/// data length.
pub fn decode_blob_data(blob: &Blob) -> Result<Vec<u8>, CodecError> {
    let data = blob.as_slice();

    if data[1] != BLOB_ENCODING_VERSION {
        return Err(CodecError::BlobVersion(data[1]));
    }
    let length = u32::from_be_bytes([0, data[2], data[3], data[4]]) as usize;
    if length > BLOB_MAX_DATA_SIZE {
        return Err(CodecError::InvalidBlob("length exceeds maximum"));
    }

    let mut output = vec![0u8; BLOB_MAX_DATA_SIZE];
    output[..27].copy_from_slice(&data[5..32]);

    let mut output_pos = 28;
    let mut input_pos = 32;
    let mut encoded = [0u8; 4];
    encoded[0] = data[0];
    if encoded[0] & 0b1100_0000 != 0 {
        return Err(CodecError::InvalidBlob("invalid field element"));
    }
    for byte in encoded.iter_mut().skip(1) {
        *byte = decode_field_element(data, output_pos, input_pos, &mut output)?;
        output_pos += 32;
        input_pos += 32;
    }
    output_pos = reassemble_bytes(output_pos, &encoded, &mut output);

    for _ in 1..BLOB_ENCODING_ROUNDS {
        if output_pos >= length {
            break;
        }
        for byte in &mut encoded {
            *byte = decode_field_element(data, output_pos, input_pos, &mut output)?;
            output_pos += 32;
            input_pos += 32;
        }
        output_pos = reassemble_bytes(output_pos, &encoded, &mut output);
    }

    if output[length..].iter().any(|b| *b != 0) {
        return Err(CodecError::InvalidBlob("non-zero data past length"));
    }
    if data[input_pos..].iter().any(|b| *b != 0) {
        return Err(CodecError::InvalidBlob("non-zero field elements past length"));
    }

    output.truncate(length);
    Ok(output)
}

/// Copies the 31 data bytes of the field element at `input_pos` into the output and returns its
/// leading byte.
fn decode_field_element(
    data: &[u8],
    output_pos: usize,
    input_pos: usize,
    output: &mut [u8],
) -> Result<u8, CodecError> {
    let element = &data[input_pos..input_pos + 32];
    if element[0] & 0b1100_0000 != 0 {
        return Err(CodecError::InvalidBlob("invalid field element"));
    }
    output[output_pos..output_pos + 31].copy_from_slice(&element[1..32]);
    Ok(element[0])
}

/// Rebuilds the 3 bytes spread over the leading bytes of a round and returns the output position
/// of the next round.
fn reassemble_bytes(output_pos: usize, encoded: &[u8; 4], output: &mut [u8]) -> usize {
    let output_pos = output_pos - 1;
    let x = (encoded[0] & 0b0011_1111) | ((encoded[1] & 0b0011_0000) << 2);
    let y = (encoded[1] & 0b0000_1111) | ((encoded[3] & 0b0000_1111) << 4);
    let z = (encoded[2] & 0b0011_1111) | ((encoded[3] & 0b0011_0000) << 2);
    output[output_pos - 32] = z;
    output[output_pos - 2 * 32] = y;
    output[output_pos - 3 * 32] = x;
    output_pos
}

/// Packs the data into a blob, using the layout read by [`decode_blob_data`].
pub fn encode_blob_data(data: &[u8]) -> Result<Blob, CodecError> {
    if data.len() > BLOB_MAX_DATA_SIZE {
        return Err(CodecError::BlobTooLarge(data.len()));
    }

    let mut blob = Blob::ZERO;
    let mut writer = BlobWriter { blob: blob.as_mut_slice(), offset: 0 };
    let mut reader = DataReader { data, offset: 0 };
    let mut chunk = [0u8; 31];

    for round in 0..BLOB_ENCODING_ROUNDS {
        if reader.offset >= data.len() {
            break;
        }
        if round == 0 {
            let len = data.len() as u32;
            chunk[0] = BLOB_ENCODING_VERSION;
            chunk[1..4].copy_from_slice(&len.to_be_bytes()[1..]);
            let n = data.len().min(27);
            chunk[4..4 + n].copy_from_slice(&data[..n]);
            reader.offset += n;
        } else {
            reader.read_chunk(&mut chunk);
        }

        let x = reader.read_byte();
        writer.write(x & 0b0011_1111, &chunk);

        reader.read_chunk(&mut chunk);
        let y = reader.read_byte();
        writer.write((y & 0b0000_1111) | ((x & 0b1100_0000) >> 2), &chunk);

        reader.read_chunk(&mut chunk);
        let z = reader.read_byte();
        writer.write(z & 0b0011_1111, &chunk);

        reader.read_chunk(&mut chunk);
        writer.write(((z & 0b1100_0000) >> 2) | ((y & 0b1111_0000) >> 4), &chunk);
    }

    debug_assert!(writer.offset <= BYTES_PER_BLOB);
    Ok(blob)
}

#[derive(Debug)]
struct DataReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl DataReader<'_> {
    fn read_byte(&mut self) -> u8 {
        let byte = self.data.get(self.offset).copied().unwrap_or_default();
        self.offset += 1;
        byte
    }

    fn read_chunk(&mut self, chunk: &mut [u8; 31]) {
        let remaining = self.data.get(self.offset..).unwrap_or_default();
        let n = remaining.len().min(31);
        chunk[..n].copy_from_slice(&remaining[..n]);
        chunk[n..].fill(0);
        self.offset += n;
    }
}

#[derive(Debug)]
struct BlobWriter<'a> {
    blob: &'a mut [u8],
    offset: usize,
}

impl BlobWriter<'_> {
    fn write(&mut self, leading: u8, chunk: &[u8; 31]) {
        self.blob[self.offset] = leading;
        self.blob[self.offset + 1..self.offset + 32].copy_from_slice(chunk);
        self.offset += 32;
    }
}
