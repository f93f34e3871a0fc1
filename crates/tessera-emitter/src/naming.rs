//! Generated identifier scheme
//!
//! Every top-level name the emitter defines starts with `$`, so it can only
//! collide with a global that the dangerous filter accepts. Collisions with the
//! assumed dangerous set of the current session are resolved by appending
//! `$1`, `$2`, ... The scheme is a pure function of the assumed set, which is
//! what makes the second pass stable.

use std::sync::Arc;

use tessera_core::ir::MemberNamespace;
use tessera_core::names::encode_name;
use tessera_core::{ClassName, FieldName, MethodName, ModuleId};

use crate::globals::GlobalRefs;

#[derive(Debug, Clone, Default)]
pub struct NameGen {
    assumed: Arc<GlobalRefs>,
}

impl NameGen {
    pub fn new(assumed: Arc<GlobalRefs>) -> Self {
        Self { assumed }
    }

    pub fn assumed(&self) -> &GlobalRefs {
        &self.assumed
    }

    /// First of `name`, `name$1`, `name$2`, ... not in the assumed set
    pub fn avoid_clash(&self, name: String) -> String {
        if !self.assumed.contains(&name) {
            return name;
        }
        let mut suffix = 1usize;
        loop {
            let candidate = format!("{}${}", name, suffix);
            if !self.assumed.contains(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    fn prefixed(&self, prefix: &str, name: &str) -> String {
        self.avoid_clash(format!("{}{}", prefix, encode_name(name)))
    }

    fn member(&self, prefix: &str, class: &ClassName, member: &str) -> String {
        self.avoid_clash(format!(
            "{}{}__{}",
            prefix,
            class.encoded(),
            encode_name(member)
        ))
    }

    /// Constructor (function or class) of a class
    pub fn class_ctor(&self, class: &ClassName) -> String {
        self.prefixed("$c_", class.as_str())
    }

    /// Prototype helper used for ES5 prototype chaining
    pub fn class_helper(&self, class: &ClassName) -> String {
        self.prefixed("$h_", class.as_str())
    }

    /// Free function implementing a method emitted outside the class body
    pub fn static_like_method(
        &self,
        namespace: MemberNamespace,
        class: &ClassName,
        method: &MethodName,
    ) -> String {
        let prefix = match namespace {
            MemberNamespace::Public => "$f_",
            MemberNamespace::PublicStatic => "$s_",
            MemberNamespace::Private => "$p_",
            MemberNamespace::PrivateStatic => "$ps_",
            MemberNamespace::Constructor => "$ct_",
            MemberNamespace::StaticConstructor => "$sct_",
        };
        self.member(prefix, class, method.as_str())
    }

    pub fn static_field(&self, class: &ClassName, field: &FieldName) -> String {
        self.member("$t_", class, field.as_str())
    }

    pub fn is_instance(&self, class: &ClassName) -> String {
        self.prefixed("$is_", class.as_str())
    }

    pub fn as_instance(&self, class: &ClassName) -> String {
        self.prefixed("$as_", class.as_str())
    }

    pub fn type_data(&self, class: &ClassName) -> String {
        self.prefixed("$d_", class.as_str())
    }

    pub fn module_accessor(&self, class: &ClassName) -> String {
        self.prefixed("$m_", class.as_str())
    }

    pub fn module_instance(&self, class: &ClassName) -> String {
        self.prefixed("$n_", class.as_str())
    }

    /// Local binding of a top-level export
    pub fn export_binding(&self, export_name: &str) -> String {
        self.prefixed("$e_", export_name)
    }

    pub fn external_import(&self, module: &str) -> String {
        self.prefixed("$i_", module)
    }

    pub fn internal_import(&self, module: &ModuleId) -> String {
        self.prefixed("$j_", module.as_str())
    }

    /// Bootstrap library definitions (`$TypeData`, ...)
    pub fn core(&self, name: &str) -> String {
        self.avoid_clash(format!("${}", name))
    }

    /// Property name of an instance method
    pub fn method_prop(&self, method: &MethodName) -> String {
        method.encoded()
    }

    /// Property name of an instance field
    pub fn field_prop(&self, field: &FieldName) -> String {
        format!("f_{}", field.encoded())
    }
}
