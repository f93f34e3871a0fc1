//! Translation of linked IR into target trees
//!
//! Every generator returns its tree together with the global refs it emitted.
//! Generators are pure functions of their inputs, the configuration, the
//! session's naming scheme and the run's [`ClassIndex`], which is what makes
//! their results cacheable.

use std::sync::OnceLock;

use regex::Regex;
use tessera_core::ir::{
    ClassKind, Expr, FieldType, JsMemberDef, JsNativeLoadSpec, Literal, MemberNamespace,
    MethodDef, Module, ModuleInitializer, TopLevelExport, TopLevelExportKind,
};
use tessera_core::names::{hijacked_typeof, HOST_ERROR_CLASS};
use tessera_core::{ClassName, LinkedClass, MethodName, ModuleId};

use crate::config::{EmitterConfig, ModuleKind};
use crate::error::EmitError;
use crate::globals::{DangerousFilter, GlobalRefs, WithGlobals};
use crate::knowledge::ClassIndex;
use crate::naming::NameGen;
use crate::tree::{DeclKind, Ident, PropName, Tree};

const THIZ: &str = "$thiz";
const CLASS_DATA: &str = "$classData";

/// Words that cannot be used after a dot in older engines
const RESERVED_WORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
    "do", "else", "enum", "export", "extends", "false", "finally", "for", "function", "if",
    "import", "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw",
    "true", "try", "typeof", "var", "void", "while", "with", "yield", "let", "static",
];

fn identifier_regex() -> Option<&'static Regex> {
    static IDENTIFIER: OnceLock<Option<Regex>> = OnceLock::new();
    IDENTIFIER
        .get_or_init(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").ok())
        .as_ref()
}

/// Whether `name` can be used as `a.name`
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_regex().is_some_and(|re| re.is_match(name)) && !RESERVED_WORDS.contains(&name)
}

/// Constructor pieces, assembled into a class definition later
///
/// With class syntax this becomes
/// `constructor(params) { before_super; super(super_args); after_super }`,
/// otherwise a constructor function calling `parent.call(this, super_args)`.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedCtor {
    pub parent: Option<Tree>,
    pub params: Vec<Ident>,
    pub before_super: Vec<Tree>,
    pub super_args: Option<Vec<Tree>>,
    pub after_super: Vec<Tree>,
}

/// Everything generators need besides the IR node they translate
pub struct CodegenCtx<'a> {
    pub config: &'a EmitterConfig,
    pub names: &'a NameGen,
    pub index: &'a ClassIndex,
    pub filter: &'a DangerousFilter,
    /// Module the generated code lives in
    pub module: &'a ModuleId,
}

impl<'a> CodegenCtx<'a> {
    /// Reference to a host global, recorded according to the tracking mode
    pub fn global(&self, name: &str, globals: &mut GlobalRefs) -> Tree {
        if self
            .config
            .global_ref_tracking
            .should_track(name, self.filter)
        {
            globals.insert(name);
        }
        Tree::ident(name)
    }

    /// Reference to a definition of `owner`, through its import if needed
    fn qualify(&self, owner: Option<&ModuleId>, name: String) -> Tree {
        match owner {
            Some(owner)
                if owner != self.module && self.config.module_kind != ModuleKind::None =>
            {
                Tree::dot(Tree::ident(self.names.internal_import(owner)), name)
            }
            _ => Tree::ident(name),
        }
    }

    pub fn class_ref(&self, class: &ClassName) -> Tree {
        self.qualify(self.index.owner(class), self.names.class_ctor(class))
    }

    pub fn helper_ref(&self, class: &ClassName) -> Tree {
        self.qualify(self.index.owner(class), self.names.class_helper(class))
    }

    /// Reference to another per-class definition (`$s_`, `$t_`, `$m_`, ...)
    pub fn class_member_ref(&self, class: &ClassName, name: String) -> Tree {
        self.qualify(self.index.owner(class), name)
    }

    /// Reference to a bootstrap library definition, which lives in the root module
    pub fn core_ref(&self, name: &str) -> Tree {
        self.qualify(self.index.root_module(), self.names.core(name))
    }

    pub fn prop_select(&self, qualifier: Tree, prop: &str) -> Tree {
        if self.config.optimize_bracket_selects && is_valid_identifier(prop) {
            Tree::dot(qualifier, prop)
        } else {
            Tree::bracket(qualifier, Tree::str(prop))
        }
    }

    pub fn prop_name(&self, prop: &str) -> PropName {
        if self.config.optimize_bracket_selects && is_valid_identifier(prop) {
            PropName::Ident(Ident::new(prop))
        } else {
            PropName::Str(prop.to_string())
        }
    }

    pub fn decl_kind(&self) -> DeclKind {
        if self.config.use_class_syntax {
            DeclKind::Let
        } else {
            DeclKind::Var
        }
    }

    pub fn const_kind(&self) -> DeclKind {
        if self.config.use_class_syntax {
            DeclKind::Const
        } else {
            DeclKind::Var
        }
    }

    /// The root throwable extends the host `Error` type when classes are
    /// emitted with class syntax
    pub fn is_rewired_throwable(&self, class: &LinkedClass) -> bool {
        class.name.is_throwable() && self.config.use_class_syntax && class.kind == ClassKind::Class
    }

    fn body(&self) -> BodyGen<'_, 'a> {
        BodyGen::new(self)
    }

    /// Parent constructor of a class, if it has one
    fn parent_ref(&self, class: &LinkedClass) -> WithGlobals<Option<Tree>> {
        let mut globals = GlobalRefs::new();
        let parent = if self.is_rewired_throwable(class) {
            Some(self.global(HOST_ERROR_CLASS, &mut globals))
        } else if class.kind.is_js_class() {
            match (&class.js_super_class, &class.super_class) {
                (Some(expr), _) => {
                    let mut body = self.body();
                    let tree = body.expr(expr);
                    globals.extend(&body.globals);
                    Some(tree)
                }
                (None, Some(parent)) => {
                    let mut body = self.body();
                    let tree = body.load_js_constructor(parent);
                    globals.extend(&body.globals);
                    Some(tree)
                }
                (None, None) => None,
            }
        } else {
            class.super_class.as_ref().map(|parent| self.class_ref(parent))
        };
        WithGlobals::with(parent, globals)
    }

    /// `$c_C.prototype`, or `$c_C` for static members
    fn member_target(&self, class: &LinkedClass, is_static: bool) -> Tree {
        let ctor = self.class_ref(&class.name);
        if is_static {
            ctor
        } else {
            Tree::dot(ctor, "prototype")
        }
    }

    /// A method emitted as a free function
    ///
    /// Non-static methods receive their receiver as the `$thiz` parameter.
    /// Constructors return it so `new` sites can chain them.
    pub fn static_like_method(
        &self,
        class: &LinkedClass,
        method: &MethodDef,
    ) -> WithGlobals<Tree> {
        let namespace = method.namespace;
        let name = self
            .names
            .static_like_method(namespace, &class.name, &method.name);
        let parent = self.parent_ref(class);

        let mut params = Vec::with_capacity(method.params.len() + 1);
        let this = if namespace.is_static() {
            Tree::This
        } else {
            params.push(Ident::new(THIZ));
            Tree::ident(THIZ)
        };
        params.extend(method.params.iter().map(|p| Ident::new(p.as_str())));

        let mut body = self.body().with_this(this).with_parent(parent.value, false);
        let mut stats = vec![body.expr(&method.body)];
        if namespace == MemberNamespace::Constructor {
            stats.push(Tree::ret(Tree::ident(THIZ)));
        }
        let globals = body.globals.union(&parent.globals);
        WithGlobals::with(Tree::function_def(name, params, Tree::block(stats)), globals)
    }

    /// A public method living in the class body or on the prototype
    pub fn member_method(&self, class: &LinkedClass, method: &MethodDef) -> WithGlobals<Tree> {
        let parent = self.parent_ref(class);
        let js_super = class.kind.is_js_class() && self.config.use_class_syntax;
        let mut body = self.body().with_parent(parent.value, js_super);
        let params: Vec<Ident> = method.params.iter().map(|p| Ident::new(p.as_str())).collect();
        let body_tree = body.expr(&method.body);
        let prop = self.names.method_prop(&method.name);

        let tree = if self.config.use_class_syntax {
            Tree::MethodDef {
                is_static: false,
                name: PropName::Ident(Ident::new(prop)),
                params,
                rest: None,
                body: Box::new(body_tree),
            }
        } else {
            Tree::assign(
                Tree::dot(self.member_target(class, false), prop),
                Tree::Function {
                    params,
                    body: Box::new(body_tree),
                },
            )
        };
        WithGlobals::with(tree, body.globals.union(&parent.globals))
    }

    /// Forwarder to the root class implementation of `method`
    ///
    /// Needed by classes whose prototype chain does not go through the root
    /// class, i.e. the rewired throwable.
    pub fn bridge(&self, method: &MethodName) -> WithGlobals<Tree> {
        let prop = self.names.method_prop(method);
        let target = Tree::dot(
            Tree::dot(self.class_ref(&ClassName::root()), "prototype"),
            prop.clone(),
        );
        let call = Tree::apply(
            Tree::dot(target, "call"),
            vec![Tree::This, Tree::Spread(Box::new(Tree::ident("args")))],
        );
        WithGlobals::new(Tree::MethodDef {
            is_static: false,
            name: PropName::Ident(Ident::new(prop)),
            params: Vec::new(),
            rest: Some(Ident::new("args")),
            body: Box::new(Tree::ret(call)),
        })
    }

    /// Constructor of a class with instances
    pub fn constructor(&self, class: &LinkedClass) -> Result<WithGlobals<GeneratedCtor>, EmitError> {
        let parent = self.parent_ref(class);
        let js_super = class.kind.is_js_class() && self.config.use_class_syntax;
        let mut body = self.body().with_parent(parent.value.clone(), js_super);

        let field_inits: Vec<Tree> = class
            .instance_fields()
            .map(|field| {
                Tree::assign(
                    Tree::dot(Tree::This, self.names.field_prop(&field.name)),
                    zero_of(field.ty),
                )
            })
            .collect();

        let ctor = if class.kind.is_js_class() {
            let js = class
                .js_constructor
                .as_ref()
                .ok_or_else(|| EmitError::MissingJsConstructor {
                    class: class.name.to_string(),
                })?;
            let js = &js.value;
            let before_super = body.exprs(&js.before_super);
            let super_args = parent.value.as_ref().map(|_| body.exprs(&js.super_args));
            let mut after_super = field_inits;
            after_super.extend(body.exprs(&js.after_super));
            GeneratedCtor {
                parent: parent.value,
                params: js.params.iter().map(|p| Ident::new(p.as_str())).collect(),
                before_super,
                super_args,
                after_super,
            }
        } else {
            let init = if self.index.has_inlineable_init(&class.name) {
                class.constructors().next()
            } else {
                None
            };
            let mut after_super = field_inits;
            let params = match init {
                Some(init) => {
                    after_super.push(body.expr(&init.value.body));
                    init.value
                        .params
                        .iter()
                        .map(|p| Ident::new(p.as_str()))
                        .collect()
                }
                None => Vec::new(),
            };
            GeneratedCtor {
                super_args: parent.value.as_ref().map(|_| Vec::new()),
                parent: parent.value,
                params,
                before_super: Vec::new(),
                after_super,
            }
        };

        Ok(WithGlobals::with(ctor, body.globals.union(&parent.globals)))
    }

    /// Complete class definition from its constructor and members
    pub fn full_class(
        &self,
        class: &LinkedClass,
        ctor: &GeneratedCtor,
        members: &[&Tree],
        exported: &[&Vec<Tree>],
    ) -> WithGlobals<Vec<Tree>> {
        let name = self.names.class_ctor(&class.name);
        let mut globals = GlobalRefs::new();

        if self.config.use_class_syntax {
            let mut ctor_body = ctor.before_super.clone();
            if let Some(args) = &ctor.super_args {
                ctor_body.push(Tree::apply(Tree::Super, args.clone()));
            }
            ctor_body.extend(ctor.after_super.iter().cloned());

            let mut class_members = vec![Tree::MethodDef {
                is_static: false,
                name: PropName::Ident(Ident::new("constructor")),
                params: ctor.params.clone(),
                rest: None,
                body: Box::new(Tree::block(ctor_body)),
            }];
            class_members.extend(members.iter().map(|m| (*m).clone()));
            class_members.extend(exported.iter().flat_map(|e| e.iter().cloned()));

            let def = Tree::ClassDef {
                name: Ident::new(name),
                parent: ctor.parent.clone().map(Box::new),
                members: class_members,
            };
            return WithGlobals::new(vec![def]);
        }

        let mut ctor_body = ctor.before_super.clone();
        if let (Some(parent), Some(args)) = (&ctor.parent, &ctor.super_args) {
            let mut call_args = vec![Tree::This];
            call_args.extend(args.iter().cloned());
            ctor_body.push(Tree::apply(Tree::dot(parent.clone(), "call"), call_args));
        }
        ctor_body.extend(ctor.after_super.iter().cloned());

        let own = Tree::ident(name.clone());
        let prototype = Tree::dot(own.clone(), "prototype");
        let mut trees = vec![Tree::function_def(
            name.clone(),
            ctor.params.clone(),
            Tree::block(ctor_body),
        )];

        if let Some(parent) = &ctor.parent {
            let proto = if class.kind.is_js_class() {
                let object = self.global("Object", &mut globals);
                Tree::apply(
                    Tree::dot(object, "create"),
                    vec![Tree::dot(parent.clone(), "prototype")],
                )
            } else {
                match &class.super_class {
                    Some(super_class) => {
                        Tree::new_instance(self.helper_ref(super_class), Vec::new())
                    }
                    None => Tree::new_instance(parent.clone(), Vec::new()),
                }
            };
            trees.push(Tree::assign(prototype.clone(), proto));
            trees.push(Tree::assign(Tree::dot(prototype.clone(), "constructor"), own));
        }

        if !class.kind.is_js_class() {
            let helper = self.names.class_helper(&class.name);
            trees.push(Tree::function_def(helper.clone(), Vec::new(), Tree::Skip));
            trees.push(Tree::assign(
                Tree::dot(Tree::ident(helper), "prototype"),
                prototype,
            ));
        }

        trees.extend(members.iter().map(|m| (*m).clone()));
        trees.extend(exported.iter().flat_map(|e| e.iter().cloned()));
        WithGlobals::with(trees, globals)
    }

    /// Member exported under a host-visible name
    ///
    /// Static members only exist on foreign classes.
    pub fn exported_member(&self, class: &LinkedClass, member: &JsMemberDef) -> WithGlobals<Vec<Tree>> {
        let is_js = class.kind.is_js_class();
        let parent = self.parent_ref(class);
        let mut body = self
            .body()
            .with_parent(parent.value, is_js && self.config.use_class_syntax);
        let mut extra = GlobalRefs::new();

        let trees = match member {
            JsMemberDef::Method {
                name,
                is_static,
                params,
                body: method_body,
            } => {
                let is_static = *is_static && is_js;
                let params: Vec<Ident> = params.iter().map(|p| Ident::new(p.as_str())).collect();
                let method_body = body.expr(method_body);
                if self.config.use_class_syntax {
                    vec![Tree::MethodDef {
                        is_static,
                        name: self.prop_name(name),
                        params,
                        rest: None,
                        body: Box::new(method_body),
                    }]
                } else {
                    vec![Tree::assign(
                        self.prop_select(self.member_target(class, is_static), name),
                        Tree::Function {
                            params,
                            body: Box::new(method_body),
                        },
                    )]
                }
            }
            JsMemberDef::Property {
                name,
                is_static,
                getter,
                setter,
            } => {
                let is_static = *is_static && is_js;
                let getter = getter.as_ref().map(|g| body.expr(g));
                let setter = setter
                    .as_ref()
                    .map(|(param, s)| (Ident::new(param.as_str()), body.expr(s)));
                if self.config.use_class_syntax {
                    let mut trees = Vec::new();
                    if let Some(getter) = getter {
                        trees.push(Tree::GetterDef {
                            is_static,
                            name: self.prop_name(name),
                            body: Box::new(getter),
                        });
                    }
                    if let Some((param, setter)) = setter {
                        trees.push(Tree::SetterDef {
                            is_static,
                            name: self.prop_name(name),
                            param,
                            body: Box::new(setter),
                        });
                    }
                    trees
                } else {
                    let mut descriptor = Vec::new();
                    if let Some(getter) = getter {
                        descriptor.push((
                            PropName::Ident(Ident::new("get")),
                            Tree::Function {
                                params: Vec::new(),
                                body: Box::new(getter),
                            },
                        ));
                    }
                    if let Some((param, setter)) = setter {
                        descriptor.push((
                            PropName::Ident(Ident::new("set")),
                            Tree::Function {
                                params: vec![param],
                                body: Box::new(setter),
                            },
                        ));
                    }
                    descriptor.push((PropName::Ident(Ident::new("configurable")), Tree::Bool(true)));
                    let object = self.global("Object", &mut extra);
                    vec![Tree::apply(
                        Tree::dot(object, "defineProperty"),
                        vec![
                            self.member_target(class, is_static),
                            Tree::str(name.as_str()),
                            Tree::ObjectConstr(descriptor),
                        ],
                    )]
                }
            }
        };

        let globals = body.globals.union(&parent.globals).union(&extra);
        WithGlobals::with(trees, globals)
    }

    /// `$is_C` and `$as_C`
    pub fn instance_tests(&self, class: &LinkedClass) -> WithGlobals<Vec<Tree>> {
        let x = || Tree::ident("x");
        let test = match hijacked_typeof(&class.name) {
            Some(type_name) => Tree::binary(
                "===",
                Tree::unary("typeof", x()),
                Tree::str(type_name),
            ),
            None => {
                let class_data = || Tree::dot(x(), CLASS_DATA);
                Tree::unary(
                    "!!",
                    Tree::binary(
                        "&&",
                        Tree::binary("&&", x(), class_data()),
                        Tree::dot(Tree::dot(class_data(), "ancestors"), class.name.encoded()),
                    ),
                )
            }
        };

        let is_name = self.names.is_instance(&class.name);
        let is_fn = Tree::function_def(is_name.clone(), vec![Ident::new("x")], Tree::ret(test));

        let as_body = Tree::if_else(
            Tree::binary(
                "||",
                Tree::apply(Tree::ident(is_name), vec![x()]),
                Tree::binary("===", x(), Tree::Null),
            ),
            Tree::ret(x()),
            Tree::apply(
                self.core_ref("throwClassCastException"),
                vec![x(), Tree::str(class.name.as_str())],
            ),
        );
        let as_fn = Tree::function_def(
            self.names.as_instance(&class.name),
            vec![Ident::new("x")],
            as_body,
        );
        WithGlobals::new(vec![is_fn, as_fn])
    }

    /// `$d_C` runtime type information
    pub fn type_data(&self, class: &LinkedClass) -> WithGlobals<Vec<Tree>> {
        let ancestors = class
            .ancestors
            .iter()
            .map(|a| (PropName::Ident(Ident::new(a.encoded())), Tree::Int(1)))
            .collect();
        let init = Tree::apply(
            Tree::dot(
                Tree::new_instance(self.core_ref("TypeData"), Vec::new()),
                "initClass",
            ),
            vec![
                Tree::str(class.name.as_str()),
                Tree::Bool(class.kind == ClassKind::Interface),
                Tree::ObjectConstr(ancestors),
            ],
        );
        let name = self.names.type_data(&class.name);
        let mut trees = vec![Tree::decl(self.const_kind(), name.clone(), Some(init))];
        if class.kind.is_class() && class.has_instances {
            trees.push(Tree::assign(
                Tree::dot(self.member_target(class, false), CLASS_DATA),
                Tree::ident(name),
            ));
        }
        WithGlobals::new(trees)
    }

    /// Lazily created singleton instance and its accessor
    pub fn module_accessor(&self, class: &LinkedClass) -> WithGlobals<Vec<Tree>> {
        let instance = self.names.module_instance(&class.name);
        let ctor = class
            .constructors()
            .next()
            .map(|c| c.value.name.clone())
            .unwrap_or_else(|| MethodName::new("init___"));
        let mut body = self.body();
        let create = body.expr(&Expr::New {
            class: class.name.clone(),
            ctor,
            args: Vec::new(),
        });

        let accessor_body = Tree::block(vec![
            Tree::if_else(
                Tree::unary("!", Tree::ident(instance.clone())),
                Tree::assign(Tree::ident(instance.clone()), create),
                Tree::Skip,
            ),
            Tree::ret(Tree::ident(instance.clone())),
        ]);
        let trees = vec![
            Tree::decl(self.decl_kind(), instance, None),
            Tree::function_def(
                self.names.module_accessor(&class.name),
                Vec::new(),
                accessor_body,
            ),
        ];
        WithGlobals::with(trees, body.globals)
    }

    /// Declarations of static fields at their zero value
    pub fn static_fields(&self, class: &LinkedClass) -> WithGlobals<Vec<Tree>> {
        let trees = class
            .static_fields()
            .map(|field| {
                Tree::decl(
                    self.decl_kind(),
                    self.names.static_field(&class.name, &field.name),
                    Some(zero_of(field.ty)),
                )
            })
            .collect();
        WithGlobals::new(trees)
    }

    /// Call of the class's static initializer, if it has one
    pub fn static_initializers(&self, class: &LinkedClass) -> WithGlobals<Vec<Tree>> {
        let trees = class
            .static_initializer()
            .map(|init| {
                let name = self.names.static_like_method(
                    MemberNamespace::StaticConstructor,
                    &class.name,
                    &init.value.name,
                );
                vec![Tree::apply(Tree::ident(name), Vec::new())]
            })
            .unwrap_or_default();
        WithGlobals::new(trees)
    }

    pub fn module_initializers(&self, initializers: &[ModuleInitializer]) -> WithGlobals<Vec<Tree>> {
        let trees = initializers
            .iter()
            .map(|init| {
                let name = self.names.static_like_method(
                    MemberNamespace::PublicStatic,
                    &init.class,
                    &init.method,
                );
                Tree::apply(self.class_member_ref(&init.class, name), Vec::new())
            })
            .collect();
        WithGlobals::new(trees)
    }

    pub fn top_level_exports(&self, exports: &[TopLevelExport]) -> WithGlobals<Vec<Tree>> {
        let mut globals = GlobalRefs::new();
        let mut trees = Vec::new();

        for export in exports {
            let binding = self.names.export_binding(&export.export_name);
            let value = match &export.kind {
                TopLevelExportKind::Method { params, body } => {
                    let mut body_gen = self.body();
                    let body = body_gen.expr(body);
                    globals.extend(&body_gen.globals);
                    trees.push(Tree::function_def(
                        binding.clone(),
                        params.iter().map(|p| Ident::new(p.as_str())).collect(),
                        body,
                    ));
                    Tree::ident(binding.clone())
                }
                TopLevelExportKind::Module { class } => Tree::apply(
                    self.class_member_ref(class, self.names.module_accessor(class)),
                    Vec::new(),
                ),
                TopLevelExportKind::JsClass { class } => self.class_ref(class),
                TopLevelExportKind::Field { class, field } => {
                    self.class_member_ref(class, self.names.static_field(class, field))
                }
            };

            match self.config.module_kind {
                ModuleKind::EsModule => {
                    // Plain local bindings are exported directly so fields stay live
                    let local = match value {
                        Tree::VarRef(ident) => ident,
                        other => {
                            trees.push(Tree::decl(DeclKind::Const, binding.clone(), Some(other)));
                            Ident::new(binding)
                        }
                    };
                    trees.push(Tree::Export(vec![(local, export.export_name.clone())]));
                }
                ModuleKind::CommonJs => {
                    let exports = self.global("exports", &mut globals);
                    trees.push(Tree::assign(
                        self.prop_select(exports, &export.export_name),
                        value,
                    ));
                }
                ModuleKind::None => {
                    trees.push(Tree::decl(
                        DeclKind::Var,
                        export.export_name.as_str(),
                        Some(value),
                    ));
                }
            }
        }

        WithGlobals::with(trees, globals)
    }

    /// Imports of internal and external dependencies
    ///
    /// Every module except the root one also imports the root module, which
    /// hosts the bootstrap library.
    pub fn imports(&self, module: &Module) -> WithGlobals<Vec<Tree>> {
        let mut globals = GlobalRefs::new();
        if self.config.module_kind == ModuleKind::None {
            return WithGlobals::new(Vec::new());
        }

        let mut internal: Vec<&ModuleId> = module.internal_dependencies.iter().collect();
        if let Some(root) = self.index.root_module() {
            if root != &module.id && !internal.contains(&root) {
                internal.push(root);
                internal.sort();
            }
        }

        let mut bindings: Vec<(String, String)> = internal
            .into_iter()
            .map(|id| (self.names.internal_import(id), self.config.module_path(id)))
            .collect();
        bindings.extend(
            module
                .external_dependencies
                .iter()
                .map(|ext| (self.names.external_import(ext), ext.clone())),
        );

        let trees = bindings
            .into_iter()
            .map(|(binding, path)| match self.config.module_kind {
                ModuleKind::CommonJs => {
                    let require = self.global("require", &mut globals);
                    Tree::decl(
                        DeclKind::Const,
                        binding,
                        Some(Tree::apply(require, vec![Tree::str(path)])),
                    )
                }
                _ => Tree::ImportNamespace {
                    binding: Ident::new(binding),
                    from: path,
                },
            })
            .collect();
        WithGlobals::with(trees, globals)
    }

    /// Makes a module's definitions reachable from the modules importing it
    pub fn internal_exports(&self, names: &[&str]) -> WithGlobals<Vec<Tree>> {
        let mut globals = GlobalRefs::new();
        let trees = match self.config.module_kind {
            ModuleKind::None => Vec::new(),
            _ if names.is_empty() => Vec::new(),
            ModuleKind::EsModule => vec![Tree::Export(
                names
                    .iter()
                    .map(|n| (Ident::new(*n), n.to_string()))
                    .collect(),
            )],
            ModuleKind::CommonJs => {
                let exports = self.global("exports", &mut globals);
                names
                    .iter()
                    .map(|n| Tree::assign(self.prop_select(exports.clone(), n), Tree::ident(*n)))
                    .collect()
            }
        };
        WithGlobals::with(trees, globals)
    }
}

fn zero_of(ty: FieldType) -> Tree {
    match ty {
        FieldType::Int => Tree::Int(0),
        FieldType::Double => Tree::Double(0.0),
        FieldType::Boolean => Tree::Bool(false),
        FieldType::Ref => Tree::Null,
    }
}

/// Translator for method and initializer bodies
struct BodyGen<'c, 'a> {
    ctx: &'c CodegenCtx<'a>,
    this: Tree,
    parent: Option<Tree>,
    /// `super.m()` is available (foreign classes in class syntax)
    js_super: bool,
    globals: GlobalRefs,
}

impl<'c, 'a> BodyGen<'c, 'a> {
    fn new(ctx: &'c CodegenCtx<'a>) -> Self {
        Self {
            ctx,
            this: Tree::This,
            parent: None,
            js_super: false,
            globals: GlobalRefs::new(),
        }
    }

    fn with_this(mut self, this: Tree) -> Self {
        self.this = this;
        self
    }

    fn with_parent(mut self, parent: Option<Tree>, js_super: bool) -> Self {
        self.parent = parent;
        self.js_super = js_super;
        self
    }

    fn exprs(&mut self, exprs: &[Expr]) -> Vec<Tree> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn boxed(&mut self, expr: &Expr) -> Box<Tree> {
        Box::new(self.expr(expr))
    }

    fn expr(&mut self, expr: &Expr) -> Tree {
        let ctx = self.ctx;
        match expr {
            Expr::Skip => Tree::Skip,
            Expr::Block(stats) => Tree::block(self.exprs(stats)),
            Expr::VarDef { name, rhs } => {
                let rhs = self.expr(rhs);
                Tree::decl(ctx.decl_kind(), name.as_str(), Some(rhs))
            }
            Expr::Assign { lhs, rhs } => Tree::Assign {
                lhs: self.boxed(lhs),
                rhs: self.boxed(rhs),
            },
            Expr::Return(value) => Tree::Return(self.boxed(value)),
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => Tree::If {
                cond: self.boxed(cond),
                then_branch: self.boxed(then_branch),
                else_branch: Box::new(match else_branch {
                    Some(e) => self.expr(e),
                    None => Tree::Skip,
                }),
            },
            Expr::Throw(value) => Tree::Throw(self.boxed(value)),
            Expr::Literal(lit) => match lit {
                Literal::Undefined => Tree::Undefined,
                Literal::Null => Tree::Null,
                Literal::Boolean(b) => Tree::Bool(*b),
                Literal::Int(i) => Tree::Int(*i),
                Literal::Double(d) => Tree::Double(*d),
                Literal::String(s) => Tree::str(s.as_str()),
            },
            Expr::This => self.this.clone(),
            Expr::Local(name) => Tree::ident(name.as_str()),
            Expr::GlobalRef(name) => ctx.global(name, &mut self.globals),
            Expr::Apply {
                receiver,
                method,
                args,
            } => {
                let receiver = self.expr(receiver);
                let args = self.exprs(args);
                Tree::apply(Tree::dot(receiver, ctx.names.method_prop(method)), args)
            }
            Expr::ApplyStatic {
                class,
                method,
                args,
            } => {
                let args = self.exprs(args);
                let name = ctx
                    .names
                    .static_like_method(MemberNamespace::PublicStatic, class, method);
                Tree::apply(ctx.class_member_ref(class, name), args)
            }
            Expr::ApplySuper { method, args } => {
                let args = self.exprs(args);
                let prop = ctx.names.method_prop(method);
                if self.js_super {
                    Tree::apply(Tree::dot(Tree::Super, prop), args)
                } else {
                    let parent = self
                        .parent
                        .clone()
                        .unwrap_or_else(|| ctx.class_ref(&ClassName::root()));
                    let mut call_args = vec![self.this.clone()];
                    call_args.extend(args);
                    Tree::apply(
                        Tree::dot(Tree::dot(Tree::dot(parent, "prototype"), prop), "call"),
                        call_args,
                    )
                }
            }
            Expr::ApplyConstructor { class, ctor, args } => {
                let mut call_args = vec![self.this.clone()];
                call_args.extend(self.exprs(args));
                let name = ctx
                    .names
                    .static_like_method(MemberNamespace::Constructor, class, ctor);
                Tree::apply(ctx.class_member_ref(class, name), call_args)
            }
            Expr::New { class, ctor, args } => {
                let args = self.exprs(args);
                match ctx.index.kind(class) {
                    Some(kind) if kind.is_js_class() => {
                        Tree::new_instance(ctx.class_ref(class), args)
                    }
                    Some(ClassKind::NativeJsClass) => {
                        let ctor = self.load_native(class);
                        Tree::new_instance(ctor, args)
                    }
                    _ if ctx.index.has_inlineable_init(class) => {
                        Tree::new_instance(ctx.class_ref(class), args)
                    }
                    _ => {
                        let name =
                            ctx.names
                                .static_like_method(MemberNamespace::Constructor, class, ctor);
                        let mut call_args =
                            vec![Tree::new_instance(ctx.class_ref(class), Vec::new())];
                        call_args.extend(args);
                        Tree::apply(ctx.class_member_ref(class, name), call_args)
                    }
                }
            }
            Expr::LoadModule(class) => Tree::apply(
                ctx.class_member_ref(class, ctx.names.module_accessor(class)),
                Vec::new(),
            ),
            Expr::LoadJsConstructor(class) => self.load_js_constructor(class),
            Expr::Select { qualifier, field } => {
                let qualifier = self.expr(qualifier);
                Tree::dot(qualifier, ctx.names.field_prop(field))
            }
            Expr::SelectStatic { class, field } => {
                ctx.class_member_ref(class, ctx.names.static_field(class, field))
            }
            Expr::JsSelect {
                qualifier,
                property,
            } => {
                let qualifier = self.expr(qualifier);
                ctx.prop_select(qualifier, property)
            }
            Expr::JsCall { function, args } => {
                let function = self.expr(function);
                Tree::apply(function, self.exprs(args))
            }
            Expr::UnaryOp { op, arg } => Tree::Unary {
                op: op.clone(),
                arg: self.boxed(arg),
            },
            Expr::BinaryOp { op, lhs, rhs } => Tree::Binary {
                op: op.clone(),
                lhs: self.boxed(lhs),
                rhs: self.boxed(rhs),
            },
            Expr::IsInstanceOf { expr, class } => {
                let value = self.expr(expr);
                match hijacked_typeof(class) {
                    Some(type_name) => Tree::binary(
                        "===",
                        Tree::unary("typeof", value),
                        Tree::str(type_name),
                    ),
                    None => {
                        let name = ctx.names.is_instance(class);
                        Tree::apply(self.type_test_ref(class, name), vec![value])
                    }
                }
            }
            Expr::AsInstanceOf { expr, class } => {
                let value = self.expr(expr);
                let name = ctx.names.as_instance(class);
                Tree::apply(self.type_test_ref(class, name), vec![value])
            }
        }
    }

    /// Instance tests of the root class are part of the bootstrap library
    fn type_test_ref(&self, class: &ClassName, name: String) -> Tree {
        if class.is_root() {
            self.ctx.qualify(self.ctx.index.root_module(), name)
        } else {
            self.ctx.class_member_ref(class, name)
        }
    }

    fn load_js_constructor(&mut self, class: &ClassName) -> Tree {
        match self.ctx.index.kind(class) {
            Some(ClassKind::NativeJsClass) => self.load_native(class),
            _ => self.ctx.class_ref(class),
        }
    }

    /// Native classes are found through their load spec
    ///
    /// Without a module system, imported natives are looked up as globals.
    fn load_native(&mut self, class: &ClassName) -> Tree {
        let ctx = self.ctx;
        let (root, path) = match ctx.index.native_load_spec(class) {
            Some(JsNativeLoadSpec::Import { module, path })
                if ctx.config.module_kind != ModuleKind::None =>
            {
                (Tree::ident(ctx.names.external_import(module)), path.as_slice())
            }
            Some(JsNativeLoadSpec::Import { path, .. })
            | Some(JsNativeLoadSpec::Global { path }) => match path.split_first() {
                Some((first, rest)) => (ctx.global(first, &mut self.globals), rest),
                None => (ctx.global("globalThis", &mut self.globals), path.as_slice()),
            },
            None => return ctx.class_ref(class),
        };
        path.iter()
            .fold(root, |qualifier, item| ctx.prop_select(qualifier, item))
    }
}
