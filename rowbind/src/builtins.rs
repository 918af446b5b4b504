//! Core rule set for a freshly created root scope
//!
//! Installs argument binders, column mappers, row mappers, and collectors
//! for the built-in scalar types, their optional forms, blobs, the raw
//! [`SqlValue`] passthrough, and the generic row-to-map producer. Installed
//! through the normal registration surface, so every rule here can be
//! shadowed by a later registration on the same scope or a derived one.

use std::hash::Hash;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::argument::{ArgumentBinder, Arguments, OptionBinder, ScalarBinder};
use crate::chain::ExactFactory;
use crate::collector::{
    map_collector_factory, optional_collector_factory, sequence_collector_factory,
    set_collector_factory, Collectors,
};
use crate::config::ConfigScope;
use crate::descriptor::{BoundTypes, StaticType};
use crate::mapper::{
    entry_row_mapper_factory, ColumnMapper, ColumnMappers, MapRowMapper, OptionColumnMapper,
    RowMapper, RowMappers, ScalarColumnMapper,
};
use crate::value::{SqlTypeTag, SqlValue};

fn scalar_rules<T: StaticType>(
    arguments: &mut Arguments,
    columns: &mut ColumnMappers,
    types: &mut BoundTypes,
    convert: fn(&T) -> SqlValue,
    extract: fn(SqlValue) -> Result<T, SqlValue>,
    tag: SqlTypeTag,
) {
    types.register::<T>();
    types.register::<Option<T>>();
    arguments.register(Arc::new(ExactFactory::new(
        T::descriptor(),
        Arc::new(ScalarBinder::new(convert)) as Arc<dyn ArgumentBinder>,
    )));
    arguments.register(Arc::new(ExactFactory::new(
        Option::<T>::descriptor(),
        Arc::new(OptionBinder::new(convert, tag)) as Arc<dyn ArgumentBinder>,
    )));
    columns.register(Arc::new(ExactFactory::new(
        T::descriptor(),
        Arc::new(ScalarColumnMapper::new(extract)) as Arc<dyn ColumnMapper>,
    )));
    columns.register(Arc::new(ExactFactory::new(
        Option::<T>::descriptor(),
        Arc::new(OptionColumnMapper::new(extract)) as Arc<dyn ColumnMapper>,
    )));
}

fn container_rules<T: StaticType>(collectors: &mut Collectors) {
    collectors.register(sequence_collector_factory::<T>());
    collectors.register(optional_collector_factory::<T>());
}

fn hashed_container_rules<T: StaticType + Eq + Hash>(collectors: &mut Collectors) {
    collectors.register(set_collector_factory::<T>());
}

/// Install the core rules on `scope`.
pub fn install(scope: &ConfigScope) {
    let mut arguments = Arguments::default();
    let mut columns = ColumnMappers::default();
    let mut types = BoundTypes::default();

    scalar_rules::<bool>(
        &mut arguments,
        &mut columns,
        &mut types,
        |v| SqlValue::Boolean(*v),
        |v| match v {
            SqlValue::Boolean(b) => Ok(b),
            other => Err(other),
        },
        SqlTypeTag::Boolean,
    );
    scalar_rules::<i16>(
        &mut arguments,
        &mut columns,
        &mut types,
        |v| SqlValue::Integer(i64::from(*v)),
        |v| match v {
            SqlValue::Integer(i) => i16::try_from(i).map_err(|_| SqlValue::Integer(i)),
            other => Err(other),
        },
        SqlTypeTag::Integer,
    );
    scalar_rules::<i32>(
        &mut arguments,
        &mut columns,
        &mut types,
        |v| SqlValue::Integer(i64::from(*v)),
        |v| match v {
            SqlValue::Integer(i) => i32::try_from(i).map_err(|_| SqlValue::Integer(i)),
            other => Err(other),
        },
        SqlTypeTag::Integer,
    );
    scalar_rules::<i64>(
        &mut arguments,
        &mut columns,
        &mut types,
        |v| SqlValue::Integer(*v),
        |v| match v {
            SqlValue::Integer(i) => Ok(i),
            other => Err(other),
        },
        SqlTypeTag::Integer,
    );
    scalar_rules::<f32>(
        &mut arguments,
        &mut columns,
        &mut types,
        |v| SqlValue::Float(f64::from(*v)),
        |v| match v {
            SqlValue::Float(f) => Ok(f as f32),
            other => Err(other),
        },
        SqlTypeTag::Float,
    );
    scalar_rules::<f64>(
        &mut arguments,
        &mut columns,
        &mut types,
        |v| SqlValue::Float(*v),
        |v| match v {
            SqlValue::Float(f) => Ok(f),
            other => Err(other),
        },
        SqlTypeTag::Float,
    );
    scalar_rules::<String>(
        &mut arguments,
        &mut columns,
        &mut types,
        |v| SqlValue::Text(v.clone()),
        |v| match v {
            SqlValue::Text(s) => Ok(s),
            other => Err(other),
        },
        SqlTypeTag::Text,
    );
    scalar_rules::<Vec<u8>>(
        &mut arguments,
        &mut columns,
        &mut types,
        |v| SqlValue::Blob(v.clone()),
        |v| match v {
            SqlValue::Blob(b) => Ok(b),
            other => Err(other),
        },
        SqlTypeTag::Blob,
    );
    // raw passthrough for callers working in wire values directly
    scalar_rules::<SqlValue>(
        &mut arguments,
        &mut columns,
        &mut types,
        |v| v.clone(),
        Ok,
        SqlTypeTag::Text,
    );

    scope.configure::<Arguments>(|block| *block = arguments);
    scope.configure::<ColumnMappers>(|block| *block = columns);
    scope.configure::<BoundTypes>(|block| *block = types);

    scope.configure::<RowMappers>(|block| {
        block.register(Arc::new(ExactFactory::new(
            IndexMap::<String, SqlValue>::descriptor(),
            Arc::new(MapRowMapper) as Arc<dyn RowMapper>,
        )));
        block.register(entry_row_mapper_factory::<String, i64>());
        block.register(entry_row_mapper_factory::<String, String>());
        block.register(entry_row_mapper_factory::<i64, String>());
    });

    scope.configure::<Collectors>(|block| {
        container_rules::<bool>(block);
        container_rules::<i16>(block);
        container_rules::<i32>(block);
        container_rules::<i64>(block);
        container_rules::<f32>(block);
        container_rules::<f64>(block);
        container_rules::<String>(block);
        container_rules::<SqlValue>(block);
        container_rules::<IndexMap<String, SqlValue>>(block);
        hashed_container_rules::<bool>(block);
        hashed_container_rules::<i16>(block);
        hashed_container_rules::<i32>(block);
        hashed_container_rules::<i64>(block);
        hashed_container_rules::<String>(block);
        block.register(map_collector_factory::<String, i64>());
        block.register(map_collector_factory::<String, String>());
        block.register(map_collector_factory::<i64, String>());
    });

    log::debug!("installed core rules");
}

/// A root scope with the core rules installed.
pub fn core_scope() -> ConfigScope {
    let scope = ConfigScope::new();
    install(&scope);
    scope
}
