
pub mod error;

pub mod plan {
    pub mod expr;
    pub mod node;
}

pub mod catalog {
    pub mod view;
}

pub mod rewrite {
    pub mod context;
    pub mod driver;
    pub mod group_by;
    pub mod join;
    pub mod predicate;
    pub mod shape;
}
