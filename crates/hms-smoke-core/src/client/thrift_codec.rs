//! Binary Thrift encoding of the metastore calls made over the SASL transport.
//!
//! Only the three calls the harness needs are covered. Field ids follow
//! `hive_metastore.thrift`.

use crate::descriptor::{ColumnDescriptor, TableDescriptor, TableKind};
use thrift::protocol::{
    TBinaryInputProtocol, TBinaryOutputProtocol, TFieldIdentifier, TInputProtocol,
    TListIdentifier, TMapIdentifier, TMessageIdentifier, TMessageType, TOutputProtocol,
    TStructIdentifier, TType,
};
use thrift::{ProtocolError, ProtocolErrorKind};

/// A metastore RPC and the exceptions declared for it, by field id.
#[derive(Debug, Clone, Copy)]
pub struct Call {
    pub name: &'static str,
    /// Exception type of result field `n` is at index `n - 1`
    pub exceptions: &'static [&'static str],
}

pub const CREATE_DATABASE: Call = Call {
    name: "create_database",
    exceptions: &[
        "AlreadyExistsException",
        "InvalidObjectException",
        "MetaException",
    ],
};

pub const CREATE_TABLE: Call = Call {
    name: "create_table",
    exceptions: &[
        "AlreadyExistsException",
        "InvalidObjectException",
        "MetaException",
        "NoSuchObjectException",
    ],
};

pub const GET_SCHEMA: Call = Call {
    name: "get_schema",
    exceptions: &[
        "MetaException",
        "UnknownTableException",
        "UnknownDBException",
    ],
};

/// An exception declared by the called method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteException {
    pub kind: String,
    pub message: String,
}

impl RemoteException {
    pub fn is_already_exists(&self) -> bool {
        crate::MetastoreError::is_already_exists_kind(&self.kind)
    }
}

/// Decoded reply: the declared result or one of the declared exceptions.
pub type Reply<T> = std::result::Result<T, RemoteException>;

fn protocol_error(message: impl Into<String>) -> thrift::Error {
    thrift::Error::Protocol(ProtocolError::new(ProtocolErrorKind::InvalidData, message))
}

fn write_string_field(
    o: &mut dyn TOutputProtocol,
    name: &str,
    id: i16,
    value: &str,
) -> thrift::Result<()> {
    o.write_field_begin(&TFieldIdentifier::new(name, TType::String, id))?;
    o.write_string(value)?;
    o.write_field_end()
}

fn write_i32_field(
    o: &mut dyn TOutputProtocol,
    name: &str,
    id: i16,
    value: i32,
) -> thrift::Result<()> {
    o.write_field_begin(&TFieldIdentifier::new(name, TType::I32, id))?;
    o.write_i32(value)?;
    o.write_field_end()
}

fn write_bool_field(
    o: &mut dyn TOutputProtocol,
    name: &str,
    id: i16,
    value: bool,
) -> thrift::Result<()> {
    o.write_field_begin(&TFieldIdentifier::new(name, TType::Bool, id))?;
    o.write_bool(value)?;
    o.write_field_end()
}

fn write_field_schema(
    o: &mut dyn TOutputProtocol,
    column: &ColumnDescriptor,
) -> thrift::Result<()> {
    o.write_struct_begin(&TStructIdentifier::new("FieldSchema"))?;
    write_string_field(o, "name", 1, &column.name)?;
    write_string_field(o, "type", 2, &column.r#type)?;
    write_string_field(o, "comment", 3, &column.comment)?;
    o.write_field_stop()?;
    o.write_struct_end()
}

fn write_columns(
    o: &mut dyn TOutputProtocol,
    name: &str,
    id: i16,
    columns: &[ColumnDescriptor],
) -> thrift::Result<()> {
    o.write_field_begin(&TFieldIdentifier::new(name, TType::List, id))?;
    o.write_list_begin(&TListIdentifier::new(TType::Struct, columns.len() as i32))?;
    for column in columns {
        write_field_schema(o, column)?;
    }
    o.write_list_end()?;
    o.write_field_end()
}

fn write_storage_descriptor(
    o: &mut dyn TOutputProtocol,
    d: &TableDescriptor,
) -> thrift::Result<()> {
    o.write_struct_begin(&TStructIdentifier::new("StorageDescriptor"))?;
    write_columns(o, "cols", 1, &d.columns)?;
    write_string_field(o, "location", 2, &d.location)?;
    write_string_field(o, "inputFormat", 3, &d.input_format)?;
    write_string_field(o, "outputFormat", 4, &d.output_format)?;
    write_bool_field(o, "compressed", 5, d.compressed)?;
    write_i32_field(o, "numBuckets", 6, -1)?;

    o.write_field_begin(&TFieldIdentifier::new("serdeInfo", TType::Struct, 7))?;
    o.write_struct_begin(&TStructIdentifier::new("SerDeInfo"))?;
    write_string_field(o, "serializationLib", 2, &d.serialization_lib)?;
    o.write_field_stop()?;
    o.write_struct_end()?;
    o.write_field_end()?;

    write_bool_field(o, "storedAsSubDirectories", 12, false)?;
    o.write_field_stop()?;
    o.write_struct_end()
}

fn write_table(
    o: &mut dyn TOutputProtocol,
    d: &TableDescriptor,
    create_time: i32,
) -> thrift::Result<()> {
    o.write_struct_begin(&TStructIdentifier::new("Table"))?;
    write_string_field(o, "tableName", 1, &d.table)?;
    write_string_field(o, "dbName", 2, &d.database)?;
    write_i32_field(o, "createTime", 4, create_time)?;
    write_i32_field(o, "lastAccessTime", 5, 0)?;
    write_i32_field(o, "retention", 6, 0)?;

    o.write_field_begin(&TFieldIdentifier::new("sd", TType::Struct, 7))?;
    write_storage_descriptor(o, d)?;
    o.write_field_end()?;

    write_columns(o, "partitionKeys", 8, &[])?;

    if d.kind == TableKind::External {
        o.write_field_begin(&TFieldIdentifier::new("parameters", TType::Map, 9))?;
        o.write_map_begin(&TMapIdentifier::new(TType::String, TType::String, 1))?;
        o.write_string("EXTERNAL")?;
        o.write_string("TRUE")?;
        o.write_map_end()?;
        o.write_field_end()?;
    }

    write_string_field(o, "tableType", 12, d.kind.as_hive_type())?;
    o.write_field_stop()?;
    o.write_struct_end()
}

/// Frame a call: message header, `<name>_args` struct, message end.
fn encode_call<F>(call: &Call, seq: i32, write_args: F) -> thrift::Result<Vec<u8>>
where
    F: FnOnce(&mut dyn TOutputProtocol) -> thrift::Result<()>,
{
    let mut buf = Vec::new();
    {
        let mut o = TBinaryOutputProtocol::new(&mut buf, true);
        o.write_message_begin(&TMessageIdentifier::new(call.name, TMessageType::Call, seq))?;
        o.write_struct_begin(&TStructIdentifier::new(format!("{}_args", call.name)))?;
        write_args(&mut o)?;
        o.write_field_stop()?;
        o.write_struct_end()?;
        o.write_message_end()?;
        o.flush()?;
    }
    Ok(buf)
}

/// `create_database(Database{name})`
pub fn encode_create_database(seq: i32, name: &str) -> thrift::Result<Vec<u8>> {
    encode_call(&CREATE_DATABASE, seq, |o| {
        o.write_field_begin(&TFieldIdentifier::new("database", TType::Struct, 1))?;
        o.write_struct_begin(&TStructIdentifier::new("Database"))?;
        write_string_field(o, "name", 1, name)?;
        o.write_field_stop()?;
        o.write_struct_end()?;
        o.write_field_end()
    })
}

/// `create_table(Table)`
pub fn encode_create_table(
    seq: i32,
    descriptor: &TableDescriptor,
    create_time: i32,
) -> thrift::Result<Vec<u8>> {
    encode_call(&CREATE_TABLE, seq, |o| {
        o.write_field_begin(&TFieldIdentifier::new("tbl", TType::Struct, 1))?;
        write_table(o, descriptor, create_time)?;
        o.write_field_end()
    })
}

/// `get_schema(db_name, table_name)`
pub fn encode_get_schema(seq: i32, db: &str, table: &str) -> thrift::Result<Vec<u8>> {
    encode_call(&GET_SCHEMA, seq, |o| {
        write_string_field(o, "db_name", 1, db)?;
        write_string_field(o, "table_name", 2, table)
    })
}

/// Read an exception struct, keeping only its `message`.
fn read_exception(i: &mut dyn TInputProtocol, kind: &str) -> thrift::Result<RemoteException> {
    let mut message = String::new();
    i.read_struct_begin()?;
    loop {
        let field = i.read_field_begin()?;
        if field.field_type == TType::Stop {
            break;
        }
        match (field.id, field.field_type) {
            (Some(1), TType::String) => message = i.read_string()?,
            (_, field_type) => i.skip(field_type)?,
        }
        i.read_field_end()?;
    }
    i.read_struct_end()?;
    Ok(RemoteException {
        kind: kind.to_string(),
        message,
    })
}

fn read_field_schema(i: &mut dyn TInputProtocol) -> thrift::Result<ColumnDescriptor> {
    let mut column = ColumnDescriptor::new("", "", "");
    i.read_struct_begin()?;
    loop {
        let field = i.read_field_begin()?;
        if field.field_type == TType::Stop {
            break;
        }
        match (field.id, field.field_type) {
            (Some(1), TType::String) => column.name = i.read_string()?,
            (Some(2), TType::String) => column.r#type = i.read_string()?,
            (Some(3), TType::String) => column.comment = i.read_string()?,
            (_, field_type) => i.skip(field_type)?,
        }
        i.read_field_end()?;
    }
    i.read_struct_end()?;
    Ok(column)
}

fn read_field_schemas(i: &mut dyn TInputProtocol) -> thrift::Result<Vec<ColumnDescriptor>> {
    // The declared size comes off the wire; grow as elements actually decode.
    let list = i.read_list_begin()?;
    let mut columns = Vec::new();
    for _ in 0..list.size {
        columns.push(read_field_schema(i)?);
    }
    i.read_list_end()?;
    Ok(columns)
}

/// Decode a reply envelope, handing the `success` field (id 0) to `read_success`.
fn decode_reply<T, F>(
    call: &Call,
    seq: i32,
    bytes: &[u8],
    mut read_success: F,
) -> thrift::Result<Reply<Option<T>>>
where
    F: FnMut(&mut dyn TInputProtocol, TType) -> thrift::Result<T>,
{
    let mut i = TBinaryInputProtocol::new(bytes, true);
    let header = i.read_message_begin()?;

    if header.message_type == TMessageType::Exception {
        let err = thrift::Error::read_application_error_from_in_protocol(&mut i)?;
        i.read_message_end()?;
        return Err(thrift::Error::Application(err));
    }
    if header.message_type != TMessageType::Reply {
        return Err(protocol_error(format!(
            "expected reply to {}, got {:?}",
            call.name, header.message_type
        )));
    }
    if header.name != call.name {
        return Err(protocol_error(format!(
            "expected reply to {}, got reply to {}",
            call.name, header.name
        )));
    }
    if header.sequence_number != seq {
        return Err(protocol_error(format!(
            "sequence mismatch: sent {}, received {}",
            seq, header.sequence_number
        )));
    }

    let mut success = None;
    let mut exception = None;
    i.read_struct_begin()?;
    loop {
        let field = i.read_field_begin()?;
        if field.field_type == TType::Stop {
            break;
        }
        match field.id {
            Some(0) => success = Some(read_success(&mut i, field.field_type)?),
            Some(id) if id >= 1 && (id as usize) <= call.exceptions.len() => {
                exception = Some(read_exception(&mut i, call.exceptions[id as usize - 1])?);
            }
            _ => i.skip(field.field_type)?,
        }
        i.read_field_end()?;
    }
    i.read_struct_end()?;
    i.read_message_end()?;

    match exception {
        Some(e) => Ok(Err(e)),
        None => Ok(Ok(success)),
    }
}

/// Decode the reply of a `void` call (`create_database`, `create_table`).
pub fn decode_void_reply(call: &Call, seq: i32, bytes: &[u8]) -> thrift::Result<Reply<()>> {
    let reply = decode_reply(call, seq, bytes, |i, field_type| i.skip(field_type))?;
    Ok(reply.map(|_| ()))
}

/// Decode the reply of `get_schema`.
pub fn decode_get_schema_reply(
    seq: i32,
    bytes: &[u8],
) -> thrift::Result<Reply<Vec<ColumnDescriptor>>> {
    let reply = decode_reply(&GET_SCHEMA, seq, bytes, |i, field_type| {
        if field_type != TType::List {
            return Err(protocol_error(format!(
                "get_schema success field has type {:?}",
                field_type
            )));
        }
        read_field_schemas(i)
    })?;

    match reply {
        Ok(Some(columns)) => Ok(Ok(columns)),
        Ok(None) => Err(protocol_error("get_schema reply carries no result")),
        Err(e) => Ok(Err(e)),
    }
}
