/// Declare a record struct and its [`Record`](crate::Record) mapping.
///
/// Each field is written `name: Type => "column"`; a computed (read-only)
/// field adds `as "SQL expression"` and is read through that expression under
/// the alias `column`. The base fields `id`, `is_deleted`, `create_date` and
/// `update_date` are added automatically.
///
/// ```ignore
/// pgdao::record! {
///     pub struct User in "users" {
///         pub name: String => "user_name",
///         pub email: Option<String> => "email",
///         pub name_upper: String => "name_upper" as "UPPER(user_name)",
///     }
/// }
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident in $table:literal {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ty:ty => $column:literal $(as $sql:literal)?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $name {
            pub id: ::std::string::String,
            pub is_deleted: bool,
            pub create_date: $crate::chrono::DateTime<$crate::chrono::Utc>,
            pub update_date: ::core::option::Option<$crate::chrono::DateTime<$crate::chrono::Utc>>,
            $(
                $(#[$fmeta])*
                $fvis $field: $ty,
            )*
        }

        impl ::core::default::Default for $name {
            fn default() -> Self {
                Self {
                    id: ::std::string::String::new(),
                    is_deleted: false,
                    create_date: $crate::chrono::Utc::now(),
                    update_date: ::core::option::Option::None,
                    $(
                        $field: <$ty as ::core::default::Default>::default(),
                    )*
                }
            }
        }

        impl $crate::Record for $name {
            const TABLE: &'static str = $table;
            const FIELDS: &'static [$crate::FieldDef] = &[
                $(
                    $crate::FieldDef {
                        name: stringify!($field),
                        column: $column,
                        kind: <$ty as $crate::FieldValue>::KIND,
                        nullable: <$ty as $crate::FieldValue>::NULLABLE,
                        computed: $crate::__record_computed!($($sql)?),
                    },
                )*
            ];

            fn value(&self, field: &str) -> ::core::option::Option<$crate::Value> {
                match field {
                    "id" => ::core::option::Option::Some($crate::FieldValue::to_value(&self.id)),
                    "is_deleted" => {
                        ::core::option::Option::Some($crate::FieldValue::to_value(&self.is_deleted))
                    }
                    "create_date" => {
                        ::core::option::Option::Some($crate::FieldValue::to_value(&self.create_date))
                    }
                    "update_date" => {
                        ::core::option::Option::Some($crate::FieldValue::to_value(&self.update_date))
                    }
                    $(
                        stringify!($field) => {
                            ::core::option::Option::Some($crate::FieldValue::to_value(&self.$field))
                        }
                    )*
                    _ => ::core::option::Option::None,
                }
            }

            fn set_value(&mut self, field: &str, value: $crate::Value) -> bool {
                match field {
                    "id" => $crate::FieldValue::assign(&mut self.id, value),
                    "is_deleted" => $crate::FieldValue::assign(&mut self.is_deleted, value),
                    "create_date" => $crate::FieldValue::assign(&mut self.create_date, value),
                    "update_date" => $crate::FieldValue::assign(&mut self.update_date, value),
                    $(
                        stringify!($field) => $crate::FieldValue::assign(&mut self.$field, value),
                    )*
                    _ => false,
                }
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __record_computed {
    () => {
        ::core::option::Option::None
    };
    ($sql:literal) => {
        ::core::option::Option::Some($sql)
    };
}
