use std::fs;

use fit_rust::protocol::data_field::DataField;
use fit_rust::protocol::message_type::MessageType;
use fit_rust::protocol::value::Value as FitValue;
use fit_rust::protocol::{
    DataMessage, DefinitionMessage, FieldDefinition, FitDataMessage, FitDefinitionMessage,
    FitHeader, FitMessage, FitMessageHeader,
};
use fit_rust::Fit;

use crate::error::EncodeError;
use crate::pipeline::fit::profile::{Message, Value, PROFILE_VERSION, PROTOCOL_VERSION};

const HEADER_SIZE: u8 = 14;
const LOCAL_TYPES: usize = 16;
const ENDIAN_ABILITY: u8 = 0x80;
const BASE_TYPE_NUMBER: u8 = 0x1F;

/// Destination for FIT messages. The activity builder only talks to this
/// trait and never handles the byte layout itself.
pub trait MessageSink {
    fn write_message(&mut self, message: &Message) -> Result<(), EncodeError>;
}

/// Field layout of a definition message: (field number, size, base type).
#[derive(Debug, Clone, PartialEq, Eq)]
struct Layout {
    global: u16,
    fields: Vec<(u8, u8, u8)>,
}

impl Layout {
    fn of(message: &Message) -> Result<Self, EncodeError> {
        let mut fields = Vec::with_capacity(message.fields.len());
        for field in &message.fields {
            let size = u8::try_from(field.value.size())
                .map_err(|_| EncodeError::FieldTooLarge(field.number))?;
            fields.push((field.number, size, field.value.base_type().id()));
        }
        if fields.len() > u8::MAX as usize {
            return Err(EncodeError::TooManyFields(message.global));
        }
        Ok(Self {
            global: message.global,
            fields,
        })
    }

    fn definition(&self, local: u8) -> Result<FitMessage, EncodeError> {
        let fields: Vec<FieldDefinition> = self
            .fields
            .iter()
            .map(|&(number, size, base_type)| {
                // fit-rust carries the endian-ability bit as its own flag.
                FieldDefinition::new(
                    number,
                    size,
                    base_type & ENDIAN_ABILITY != 0,
                    base_type & BASE_TYPE_NUMBER,
                )
            })
            .collect();

        Ok(FitMessage::Definition(FitDefinitionMessage {
            header: FitMessageHeader::new(true, local),
            data: DefinitionMessage::new(
                false,
                fields.len() as u8,
                fields,
                message_type(self.global)?,
            ),
        }))
    }
}

fn message_type(global: u16) -> Result<MessageType, EncodeError> {
    MessageType::from_primitive(global)
        .filter(|kind| *kind != MessageType::None)
        .ok_or(EncodeError::UnknownMessage(global))
}

fn encoder_value(value: &Value) -> FitValue {
    match value {
        Value::Enum(v) => FitValue::U8(*v),
        Value::UInt16(v) => FitValue::U16(*v),
        Value::UInt32(v) | Value::UInt32z(v) => FitValue::U32(*v),
        Value::Time(unix) => FitValue::Time(*unix),
        Value::Position(degrees) => FitValue::F32(*degrees),
        Value::String(s) => FitValue::String(format!("{}\0", s)),
    }
}

/// Collects messages for the `fit-rust` encoder.
///
/// Each distinct field layout gets a local message type; once all sixteen
/// are taken the oldest slot is redefined.
#[derive(Debug, Default)]
pub struct FitWriter {
    messages: Vec<FitMessage>,
    locals: Vec<Layout>,
    next_slot: usize,
}

impl FitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn local_type(&mut self, layout: Layout) -> Result<u8, EncodeError> {
        if let Some(index) = self.locals.iter().position(|existing| *existing == layout) {
            return Ok(index as u8);
        }

        let slot = if self.locals.len() < LOCAL_TYPES {
            self.locals.push(layout);
            self.locals.len() - 1
        } else {
            let slot = self.next_slot;
            self.next_slot = (self.next_slot + 1) % LOCAL_TYPES;
            self.locals[slot] = layout;
            slot
        };

        let definition = self.locals[slot].definition(slot as u8)?;
        self.messages.push(definition);
        Ok(slot as u8)
    }

    /// Hands the collected messages to `fit-rust` and returns the file bytes.
    pub fn finish(self) -> Result<Vec<u8>, EncodeError> {
        let fit = Fit {
            header: FitHeader {
                header_size: HEADER_SIZE,
                protocol_version: PROTOCOL_VERSION,
                profile_version: PROFILE_VERSION,
                data_size: 0,
                data_type: ".FIT".to_string(),
                crc: Some(0),
            },
            data: self.messages,
        };

        // fit-rust only writes to a path.
        let staged = tempfile::Builder::new()
            .prefix("treadsim-")
            .suffix(".fit")
            .tempfile()?;
        fit.write(staged.path())
            .map_err(|err| EncodeError::Writer(err.to_string()))?;
        let mut bytes = fs::read(staged.path())?;
        reseal(&mut bytes)?;
        Ok(bytes)
    }
}

impl MessageSink for FitWriter {
    fn write_message(&mut self, message: &Message) -> Result<(), EncodeError> {
        let message_type = message_type(message.global)?;
        let local = self.local_type(Layout::of(message)?)?;
        let values = message
            .fields
            .iter()
            .map(|field| DataField::new(field.number, encoder_value(&field.value)))
            .collect();

        self.messages.push(FitMessage::Data(FitDataMessage {
            header: FitMessageHeader::new(false, local),
            data: DataMessage {
                message_type,
                values,
            },
        }));
        Ok(())
    }
}

/// fit-rust checksums only the data records; FIT readers expect the
/// trailing CRC to cover the header too.
fn reseal(bytes: &mut [u8]) -> Result<(), EncodeError> {
    let end = bytes.len().saturating_sub(2);
    if end < HEADER_SIZE as usize {
        return Err(EncodeError::Writer(format!(
            "encoder produced {} bytes",
            bytes.len()
        )));
    }
    let crc = crc16(&bytes[..end]);
    bytes[end..].copy_from_slice(&crc.to_le_bytes());
    Ok(())
}

const CRC_TABLE: [u16; 16] = [
    0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401, 0xA001, 0x6C00, 0x7800,
    0xB401, 0x5000, 0x9C01, 0x8801, 0x4400,
];

/// FIT's CRC-16, processed a nibble at a time.
pub fn crc16(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |crc, &byte| {
        let tmp = CRC_TABLE[(crc & 0xF) as usize];
        let crc = (crc >> 4) & 0x0FFF;
        let crc = crc ^ tmp ^ CRC_TABLE[(byte & 0xF) as usize];
        let tmp = CRC_TABLE[(crc & 0xF) as usize];
        let crc = (crc >> 4) & 0x0FFF;
        crc ^ tmp ^ CRC_TABLE[((byte >> 4) & 0xF) as usize]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fit::profile::mesg_num;

    const DEFINITION_FLAG: u8 = 0x40;

    fn file_id(serial: u32) -> Message {
        Message::new(mesg_num::FILE_ID)
            .field(0, Value::Enum(4))
            .field(3, Value::UInt32z(serial))
    }

    #[test]
    fn crc_matches_reference_check_value() {
        assert_eq!(crc16(b"123456789"), 0xBB3D);
        assert_eq!(crc16(&[]), 0);
    }

    #[test]
    fn empty_file_has_header_and_crc() {
        let bytes = FitWriter::new().finish().unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes[0], 14);
        assert_eq!(bytes[1], PROTOCOL_VERSION);
        assert_eq!(&bytes[8..12], b".FIT");
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 0);
        assert_eq!(crc16(&bytes[..12]), u16::from_le_bytes([bytes[12], bytes[13]]));
        assert_eq!(crc16(&bytes), 0);
    }

    #[test]
    fn repeated_layout_reuses_definition() {
        let mut writer = FitWriter::new();
        writer.write_message(&file_id(1)).unwrap();
        writer.write_message(&file_id(2)).unwrap();
        let bytes = writer.finish().unwrap();

        // definition: 6 + 2 fields * 3, then two data messages of 1 + 1 + 4
        let data_size = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        assert_eq!(data_size, 12 + 6 + 6);
        assert_eq!(bytes[14], DEFINITION_FLAG);
        assert_eq!(bytes[14 + 12], 0);
        assert_eq!(bytes[14 + 18], 0);
    }

    #[test]
    fn base_types_keep_their_endian_bit() {
        let mut writer = FitWriter::new();
        writer.write_message(&file_id(1)).unwrap();
        let bytes = writer.finish().unwrap();
        // field definitions start after the 6-byte definition header
        assert_eq!(&bytes[14 + 6..14 + 9], &[0, 1, 0x00]);
        assert_eq!(&bytes[14 + 9..14 + 12], &[3, 4, 0x8C]);
    }

    #[test]
    fn new_layout_gets_new_local_type() {
        let mut writer = FitWriter::new();
        writer.write_message(&file_id(1)).unwrap();
        writer
            .write_message(&Message::new(mesg_num::USER_PROFILE).field(4, Value::UInt16(720)))
            .unwrap();
        let bytes = writer.finish().unwrap();
        // second definition follows the first data message
        assert_eq!(bytes[14 + 12 + 6], DEFINITION_FLAG | 1);
    }

    #[test]
    fn local_types_wrap_after_sixteen_layouts() {
        let mut writer = FitWriter::new();
        for field in 0..17u8 {
            writer
                .write_message(&Message::new(mesg_num::RECORD).field(field, Value::UInt16(1)))
                .unwrap();
        }
        assert_eq!(writer.locals.len(), LOCAL_TYPES);
        assert_eq!(writer.next_slot, 1);
        assert_eq!(writer.locals[0].fields[0].0, 16);
    }

    #[test]
    fn unknown_global_message_is_rejected() {
        let mut writer = FitWriter::new();
        let result = writer.write_message(&Message::new(0x1234).field(0, Value::Enum(1)));
        assert!(matches!(result, Err(EncodeError::UnknownMessage(0x1234))));
    }

    #[test]
    fn output_passes_crc_validation() {
        let mut writer = FitWriter::new();
        writer.write_message(&file_id(0xDEAD_BEEF)).unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(crc16(&bytes), 0);

        let records = fitparser::from_bytes(&bytes).expect("valid FIT");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), fitparser::profile::MesgNum::FileId);
    }
}
