// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative macros shared by the workspace.
//!
//! - [`simple_display!`] — `Display` for status/result enums whose wire
//!   names are fixed strings (`TestResult`, `DeviceStatus`, `ErrorId`, ...)
//! - [`builder!`] — test-only fixture builders for the larger records
//!   (`JobSpec`, `Test`, `DeviceInfo`), gated behind `test-support`

/// Generate a `Display` impl that maps enum variants to string literals.
///
/// Status and result enums render as their lowercase wire names in logs
/// and formatted errors; this keeps those mappings next to the enum
/// without a hand-rolled `match` per type. Unit variants match directly;
/// data-carrying variants use `(..)` or `{ .. }` to ignore their fields.
///
/// ```ignore
/// crate::simple_display! {
///     TestResult {
///         Pass => "pass",
///         Fail => "fail",
///         Timeout => "timeout",
///     }
/// }
///
/// crate::simple_display! {
///     SessionState {
///         Running => "running",
///         Finished { .. } => "finished",
///     }
/// }
/// ```
#[macro_export]
macro_rules! simple_display {
    ($enum:ty { $( $variant:ident $(( $($ignore:tt)* ))? $({ $($ignore_named:tt)* })? => $str:expr ),+ $(,)? }) => {
        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(match self {
                    $( Self::$variant $(( $($ignore)* ))? $({ $($ignore_named)* })? => $str, )+
                })
            }
        }
    };
}

/// Generate a fixture builder (struct + Default + setters + build) for
/// tests.
///
/// The large records (`JobSpec`, `Test`, `DeviceInfo`) have many fields a
/// test rarely cares about; the generated builder starts from sensible
/// fixture defaults so a test only names what it is actually exercising.
/// All generated items are gated behind
/// `#[cfg(any(test, feature = "test-support"))]` so nothing leaks into
/// production builds.
///
/// Field groups:
/// - `into { field: Type = default }` — setter uses `impl Into<Type>`
/// - `set { field: Type = default }` — setter takes `Type` directly
/// - `option { field: Type = default }` — builder field is `Option<Type>`,
///   setter wraps in `Some(v.into())`
/// - `computed { field: Type = expr }` — no builder field or setter;
///   value computed at build time
///
/// ```ignore
/// crate::builder! {
///     pub struct JobSpecBuilder => JobSpec {
///         into {
///             name: String = "test-job",
///         }
///         set {
///             id: JobId = JobId::generate(),
///             setting: JobSetting = JobSetting::default(),
///             device_count: u32 = 1,
///         }
///     }
/// }
///
/// // In a test:
/// let spec = JobSpec::builder().name("boot-check").device_count(3).build();
/// ```
#[macro_export]
macro_rules! builder {
    (
        pub struct $builder:ident => $target:ident {
            $(into {
                $( $into_field:ident : $into_ty:ty = $into_default:expr ),* $(,)?
            })?
            $(set {
                $( $set_field:ident : $set_ty:ty = $set_default:expr ),* $(,)?
            })?
            $(option {
                $( $opt_field:ident : $opt_ty:ty = $opt_default:expr ),* $(,)?
            })?
            $(computed {
                $( $comp_field:ident : $comp_ty:ty = $comp_expr:expr ),* $(,)?
            })?
        }
    ) => {
        #[cfg(any(test, feature = "test-support"))]
        pub struct $builder {
            $($( $into_field: $into_ty, )*)?
            $($( $set_field: $set_ty, )*)?
            $($( $opt_field: Option<$opt_ty>, )*)?
        }

        #[cfg(any(test, feature = "test-support"))]
        impl Default for $builder {
            fn default() -> Self {
                Self {
                    $($( $into_field: $into_default.into(), )*)?
                    $($( $set_field: $set_default, )*)?
                    $($( $opt_field: $opt_default, )*)?
                }
            }
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $builder {
            $($(
                pub fn $into_field(mut self, v: impl Into<$into_ty>) -> Self {
                    self.$into_field = v.into();
                    self
                }
            )*)?

            $($(
                pub fn $set_field(mut self, v: $set_ty) -> Self {
                    self.$set_field = v;
                    self
                }
            )*)?

            $($(
                pub fn $opt_field(mut self, v: impl Into<$opt_ty>) -> Self {
                    self.$opt_field = Some(v.into());
                    self
                }
            )*)?

            pub fn build(self) -> $target {
                $target {
                    $($( $into_field: self.$into_field, )*)?
                    $($( $set_field: self.$set_field, )*)?
                    $($( $opt_field: self.$opt_field, )*)?
                    $($( $comp_field: $comp_expr, )*)?
                }
            }
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $target {
            /// Create a builder with fixture defaults.
            pub fn builder() -> $builder {
                $builder::default()
            }
        }
    };
}
