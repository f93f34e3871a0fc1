//! Builders for assembling linked IR by hand
//!
//! Used by tests and by tools that synthesize small programs.

use crate::ir::{
    ClassKind, Expr, FieldDef, FieldType, JsConstructorDef, JsMemberDef, JsNativeLoadSpec,
    LinkedClass, MemberNamespace, MethodDef, Module, ModuleInitializer, TopLevelExport,
    TopLevelExportKind, Versioned,
};
use crate::names::{ClassName, FieldName, MethodName, ModuleId};
use crate::version::Version;

pub struct ClassBuilder {
    class: LinkedClass,
}

impl ClassBuilder {
    /// Start a class whose ancestors are just itself
    pub fn new(name: impl Into<ClassName>, kind: ClassKind) -> Self {
        let name = name.into();
        Self {
            class: LinkedClass {
                ancestors: vec![name.clone()],
                name,
                kind,
                version: Version::from_int(1),
                super_class: None,
                js_super_class: None,
                js_native_load_spec: None,
                fields: Vec::new(),
                methods: Vec::new(),
                js_constructor: None,
                exported_members: Vec::new(),
                has_instances: false,
                has_instance_tests: false,
                has_runtime_type_info: false,
                has_module_accessor: kind.is_module_like(),
            },
        }
    }

    pub fn version(mut self, version: Version) -> Self {
        self.class.version = version;
        self
    }

    /// Set the superclass and append it to the ancestors
    pub fn extends(mut self, parent: impl Into<ClassName>) -> Self {
        let parent = parent.into();
        if !self.class.ancestors.contains(&parent) {
            self.class.ancestors.push(parent.clone());
        }
        self.class.super_class = Some(parent);
        self
    }

    /// Append further ancestors (transitive superclasses or interfaces)
    pub fn ancestor(mut self, ancestor: impl Into<ClassName>) -> Self {
        let ancestor = ancestor.into();
        if !self.class.ancestors.contains(&ancestor) {
            self.class.ancestors.push(ancestor);
        }
        self
    }

    pub fn js_super_class(mut self, parent: Expr) -> Self {
        self.class.js_super_class = Some(parent);
        self
    }

    pub fn native_load_spec(mut self, spec: JsNativeLoadSpec) -> Self {
        self.class.js_native_load_spec = Some(spec);
        self
    }

    pub fn field(mut self, name: impl Into<FieldName>, ty: FieldType) -> Self {
        self.class.fields.push(FieldDef {
            name: name.into(),
            ty,
            is_static: false,
        });
        self
    }

    pub fn static_field(mut self, name: impl Into<FieldName>, ty: FieldType) -> Self {
        self.class.fields.push(FieldDef {
            name: name.into(),
            ty,
            is_static: true,
        });
        self
    }

    pub fn method(
        mut self,
        namespace: MemberNamespace,
        name: impl Into<MethodName>,
        params: &[&str],
        body: Expr,
        version: Version,
    ) -> Self {
        self.class.methods.push(Versioned::new(
            MethodDef {
                name: name.into(),
                namespace,
                params: params.iter().map(|p| p.to_string()).collect(),
                body,
            },
            version,
        ));
        self
    }

    /// Public instance method at version `#1`
    pub fn public_method(self, name: impl Into<MethodName>, body: Expr) -> Self {
        self.method(MemberNamespace::Public, name, &[], body, Version::from_int(1))
    }

    pub fn constructor(self, name: impl Into<MethodName>, params: &[&str], body: Expr) -> Self {
        self.method(
            MemberNamespace::Constructor,
            name,
            params,
            body,
            Version::from_int(1),
        )
    }

    pub fn js_constructor(mut self, ctor: JsConstructorDef, version: Version) -> Self {
        self.class.js_constructor = Some(Versioned::new(ctor, version));
        self
    }

    pub fn exported_member(mut self, member: JsMemberDef, version: Version) -> Self {
        self.class
            .exported_members
            .push(Versioned::new(member, version));
        self
    }

    pub fn with_instances(mut self) -> Self {
        self.class.has_instances = true;
        self
    }

    pub fn with_instance_tests(mut self) -> Self {
        self.class.has_instance_tests = true;
        self
    }

    pub fn with_type_data(mut self) -> Self {
        self.class.has_runtime_type_info = true;
        self
    }

    pub fn with_module_accessor(mut self) -> Self {
        self.class.has_module_accessor = true;
        self
    }

    pub fn build(self) -> LinkedClass {
        self.class
    }
}

pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn new(id: impl Into<ModuleId>) -> Self {
        Self {
            module: Module {
                id: id.into(),
                classes: Vec::new(),
                external_dependencies: Default::default(),
                internal_dependencies: Default::default(),
                top_level_exports: Vec::new(),
                initializers: Vec::new(),
                initializers_version: Version::from_int(1),
                is_root: false,
            },
        }
    }

    pub fn root(mut self) -> Self {
        self.module.is_root = true;
        self
    }

    pub fn class(mut self, class: LinkedClass) -> Self {
        self.module.classes.push(class);
        self
    }

    pub fn depends_on(mut self, module: impl Into<ModuleId>) -> Self {
        self.module.internal_dependencies.insert(module.into());
        self
    }

    pub fn external(mut self, module: impl Into<String>) -> Self {
        self.module.external_dependencies.insert(module.into());
        self
    }

    pub fn export(
        mut self,
        name: impl Into<String>,
        kind: TopLevelExportKind,
        version: Version,
    ) -> Self {
        self.module.top_level_exports.push(TopLevelExport {
            export_name: name.into(),
            kind,
            version,
        });
        self
    }

    pub fn initializer(
        mut self,
        class: impl Into<ClassName>,
        method: impl Into<MethodName>,
    ) -> Self {
        self.module.initializers.push(ModuleInitializer {
            class: class.into(),
            method: method.into(),
        });
        self
    }

    pub fn initializers_version(mut self, version: Version) -> Self {
        self.module.initializers_version = version;
        self
    }

    pub fn build(self) -> Module {
        self.module
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_builder_tracks_ancestors() {
        let class = ClassBuilder::new("app.Child", ClassKind::Class)
            .extends("app.Parent")
            .ancestor("lang.Object")
            .ancestor("app.Parent")
            .build();
        let names: Vec<&str> = class.ancestors.iter().map(|a| a.as_str()).collect();
        assert_eq!(names, vec!["app.Child", "app.Parent", "lang.Object"]);
        assert_eq!(class.super_class, Some(ClassName::from("app.Parent")));
    }

    #[test]
    fn test_module_classes_get_accessor() {
        let module = ClassBuilder::new("app.Main$", ClassKind::ModuleClass).build();
        assert!(module.has_module_accessor);
        let plain = ClassBuilder::new("app.Point", ClassKind::Class).build();
        assert!(!plain.has_module_accessor);
    }

    #[test]
    fn test_module_builder() {
        let module = ModuleBuilder::new("main")
            .root()
            .depends_on("util")
            .external("fs")
            .initializer("app.Main", "main__V")
            .build();
        assert!(module.is_root);
        assert!(module.internal_dependencies.contains("util"));
        assert!(module.external_dependencies.contains("fs"));
        assert_eq!(module.initializers.len(), 1);
    }
}
