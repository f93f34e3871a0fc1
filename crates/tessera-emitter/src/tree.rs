//! Target syntax tree
//!
//! A small subset of the target language, enough to express everything the
//! emitter generates. Printing is done downstream.

use std::fmt;

use serde::Serialize;

/// Identifier in the generated program
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Ident(pub String);

impl Ident {
    pub fn new(name: impl Into<String>) -> Self {
        Ident(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Ident {
    fn from(name: &str) -> Self {
        Ident(name.to_string())
    }
}

/// Property name in a class body or object literal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PropName {
    Ident(Ident),
    Str(String),
    Computed(Box<Tree>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Tree {
    Skip,
    Block(Vec<Tree>),
    VarDef {
        kind: DeclKind,
        name: Ident,
        rhs: Option<Box<Tree>>,
    },
    FunctionDef {
        name: Ident,
        params: Vec<Ident>,
        rest: Option<Ident>,
        body: Box<Tree>,
    },
    /// Anonymous function expression
    Function {
        params: Vec<Ident>,
        body: Box<Tree>,
    },
    ClassDef {
        name: Ident,
        parent: Option<Box<Tree>>,
        members: Vec<Tree>,
    },
    MethodDef {
        is_static: bool,
        name: PropName,
        params: Vec<Ident>,
        rest: Option<Ident>,
        body: Box<Tree>,
    },
    GetterDef {
        is_static: bool,
        name: PropName,
        body: Box<Tree>,
    },
    SetterDef {
        is_static: bool,
        name: PropName,
        param: Ident,
        body: Box<Tree>,
    },
    Assign {
        lhs: Box<Tree>,
        rhs: Box<Tree>,
    },
    Return(Box<Tree>),
    If {
        cond: Box<Tree>,
        then_branch: Box<Tree>,
        else_branch: Box<Tree>,
    },
    Throw(Box<Tree>),
    VarRef(Ident),
    This,
    Super,
    Undefined,
    Null,
    Bool(bool),
    Int(i32),
    Double(f64),
    Str(String),
    DotSelect {
        qualifier: Box<Tree>,
        item: Ident,
    },
    BracketSelect {
        qualifier: Box<Tree>,
        item: Box<Tree>,
    },
    Apply {
        fun: Box<Tree>,
        args: Vec<Tree>,
    },
    New {
        ctor: Box<Tree>,
        args: Vec<Tree>,
    },
    Spread(Box<Tree>),
    Unary {
        op: String,
        arg: Box<Tree>,
    },
    Binary {
        op: String,
        lhs: Box<Tree>,
        rhs: Box<Tree>,
    },
    ObjectConstr(Vec<(PropName, Tree)>),
    /// `import * as binding from "from"`
    ImportNamespace {
        binding: Ident,
        from: String,
    },
    /// `export { local as exported, ... }`
    Export(Vec<(Ident, String)>),
}

impl Tree {
    pub fn ident(name: impl Into<String>) -> Self {
        Tree::VarRef(Ident::new(name))
    }

    pub fn str(value: impl Into<String>) -> Self {
        Tree::Str(value.into())
    }

    /// Block that drops `Skip` and collapses single statements
    pub fn block(stats: Vec<Tree>) -> Self {
        let mut flat = Vec::with_capacity(stats.len());
        for stat in stats {
            match stat {
                Tree::Skip => {}
                Tree::Block(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Tree::Skip,
            1 => flat.pop().unwrap_or(Tree::Skip),
            _ => Tree::Block(flat),
        }
    }

    pub fn dot(qualifier: Tree, item: impl Into<String>) -> Self {
        Tree::DotSelect {
            qualifier: Box::new(qualifier),
            item: Ident::new(item),
        }
    }

    pub fn bracket(qualifier: Tree, item: Tree) -> Self {
        Tree::BracketSelect {
            qualifier: Box::new(qualifier),
            item: Box::new(item),
        }
    }

    pub fn apply(fun: Tree, args: Vec<Tree>) -> Self {
        Tree::Apply {
            fun: Box::new(fun),
            args,
        }
    }

    pub fn new_instance(ctor: Tree, args: Vec<Tree>) -> Self {
        Tree::New {
            ctor: Box::new(ctor),
            args,
        }
    }

    pub fn assign(lhs: Tree, rhs: Tree) -> Self {
        Tree::Assign {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn ret(value: Tree) -> Self {
        Tree::Return(Box::new(value))
    }

    pub fn decl(kind: DeclKind, name: impl Into<String>, rhs: Option<Tree>) -> Self {
        Tree::VarDef {
            kind,
            name: Ident::new(name),
            rhs: rhs.map(Box::new),
        }
    }

    pub fn function_def(name: impl Into<String>, params: Vec<Ident>, body: Tree) -> Self {
        Tree::FunctionDef {
            name: Ident::new(name),
            params,
            rest: None,
            body: Box::new(body),
        }
    }

    pub fn unary(op: &str, arg: Tree) -> Self {
        Tree::Unary {
            op: op.to_string(),
            arg: Box::new(arg),
        }
    }

    pub fn binary(op: &str, lhs: Tree, rhs: Tree) -> Self {
        Tree::Binary {
            op: op.to_string(),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn if_else(cond: Tree, then_branch: Tree, else_branch: Tree) -> Self {
        Tree::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        }
    }

    /// Name introduced at top level by this statement, if any
    pub fn defined_name(&self) -> Option<&str> {
        match self {
            Tree::VarDef { name, .. }
            | Tree::FunctionDef { name, .. }
            | Tree::ClassDef { name, .. }
            | Tree::ImportNamespace { binding: name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    /// Visit this tree and every subtree, depth first
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Tree)) {
        visit(self);
        match self {
            Tree::Block(stats) => stats.iter().for_each(|t| t.walk(visit)),
            Tree::VarDef { rhs, .. } => {
                if let Some(rhs) = rhs {
                    rhs.walk(visit);
                }
            }
            Tree::FunctionDef { body, .. }
            | Tree::Function { body, .. }
            | Tree::GetterDef { body, .. }
            | Tree::SetterDef { body, .. } => body.walk(visit),
            Tree::MethodDef { name, body, .. } => {
                if let PropName::Computed(name) = name {
                    name.walk(visit);
                }
                body.walk(visit);
            }
            Tree::ClassDef {
                parent, members, ..
            } => {
                if let Some(parent) = parent {
                    parent.walk(visit);
                }
                members.iter().for_each(|t| t.walk(visit));
            }
            Tree::Assign { lhs, rhs } | Tree::Binary { lhs, rhs, .. } => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            Tree::Return(inner)
            | Tree::Throw(inner)
            | Tree::Spread(inner)
            | Tree::Unary { arg: inner, .. }
            | Tree::DotSelect {
                qualifier: inner, ..
            } => inner.walk(visit),
            Tree::If {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.walk(visit);
                then_branch.walk(visit);
                else_branch.walk(visit);
            }
            Tree::BracketSelect { qualifier, item } => {
                qualifier.walk(visit);
                item.walk(visit);
            }
            Tree::Apply { fun, args } | Tree::New { ctor: fun, args } => {
                fun.walk(visit);
                args.iter().for_each(|t| t.walk(visit));
            }
            Tree::ObjectConstr(fields) => fields.iter().for_each(|(_, t)| t.walk(visit)),
            _ => {}
        }
    }

    /// Whether any variable reference in this tree uses `name`
    pub fn references(&self, name: &str) -> bool {
        let mut found = false;
        self.walk(&mut |t: &Tree| {
            if let Tree::VarRef(ident) = t {
                found |= ident.as_str() == name;
            }
        });
        found
    }

    /// One-line summary used by outlines and log output
    pub fn outline(&self) -> String {
        match self {
            Tree::VarDef { kind, name, .. } => {
                let kw = match kind {
                    DeclKind::Var => "var",
                    DeclKind::Let => "let",
                    DeclKind::Const => "const",
                };
                format!("{} {}", kw, name)
            }
            Tree::FunctionDef { name, .. } => format!("function {}", name),
            Tree::ClassDef { name, members, .. } => {
                format!("class {} ({} members)", name, members.len())
            }
            Tree::ImportNamespace { binding, from } => format!("import {} from {:?}", binding, from),
            Tree::Export(names) => {
                let names: Vec<&str> = names.iter().map(|(_, n)| n.as_str()).collect();
                format!("export {{{}}}", names.join(", "))
            }
            Tree::Assign { lhs, .. } => format!("{} = ...", lhs.path()),
            Tree::Apply { fun, .. } => format!("{}(...)", fun.path()),
            Tree::Block(stats) => format!("{{ {} statements }}", stats.len()),
            other => format!("{:?}", other)
                .split(['(', ' ', '{'])
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// Dotted rendering of a select chain, `?` for anything more complex
    fn path(&self) -> String {
        match self {
            Tree::VarRef(ident) => ident.to_string(),
            Tree::This => "this".to_string(),
            Tree::DotSelect { qualifier, item } => format!("{}.{}", qualifier.path(), item),
            Tree::BracketSelect { qualifier, item } => match item.as_ref() {
                Tree::Str(s) => format!("{}[{:?}]", qualifier.path(), s),
                _ => format!("{}[?]", qualifier.path()),
            },
            _ => "?".to_string(),
        }
    }
}

/// Top-level names defined by a list of statements, in order
pub fn defined_names(trees: &[Tree]) -> Vec<&str> {
    trees.iter().filter_map(Tree::defined_name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_block_flattens() {
        let block = Tree::block(vec![
            Tree::Skip,
            Tree::Block(vec![Tree::Int(1), Tree::Int(2)]),
            Tree::Int(3),
        ]);
        assert_eq!(
            block,
            Tree::Block(vec![Tree::Int(1), Tree::Int(2), Tree::Int(3)])
        );
        assert_eq!(Tree::block(vec![Tree::Skip]), Tree::Skip);
        assert_eq!(Tree::block(vec![Tree::Int(7)]), Tree::Int(7));
    }

    #[test]
    fn test_defined_names() {
        let trees = vec![
            Tree::decl(DeclKind::Let, "$t_A__x", Some(Tree::Int(0))),
            Tree::assign(Tree::ident("$t_A__x"), Tree::Int(1)),
            Tree::function_def("$m_A", vec![], Tree::Skip),
        ];
        assert_eq!(defined_names(&trees), vec!["$t_A__x", "$m_A"]);
    }

    #[test]
    fn test_references_looks_into_nested_trees() {
        let tree = Tree::function_def(
            "f",
            vec![],
            Tree::ret(Tree::apply(
                Tree::dot(Tree::ident("$c_A"), "call"),
                vec![Tree::This],
            )),
        );
        assert!(tree.references("$c_A"));
        assert!(!tree.references("$c_B"));
    }

    #[test]
    fn test_outline() {
        let assign = Tree::assign(
            Tree::dot(Tree::dot(Tree::ident("$c_A"), "prototype"), "m"),
            Tree::Skip,
        );
        assert_eq!(assign.outline(), "$c_A.prototype.m = ...");
        assert_eq!(
            Tree::decl(DeclKind::Const, "$d_A", None).outline(),
            "const $d_A"
        );
        assert_eq!(Tree::Int(3).outline(), "Int");
    }
}
