//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod class;
pub mod class_arm;
pub mod class_level;
pub mod enrollment;
pub mod grade;
pub mod student;
pub mod teacher;
pub mod term;
pub mod transfer;

// Re-export specific types to avoid conflicts
pub use class::{Column as ClassColumn, Entity as Class, Model as ClassModel};
pub use class_arm::{Column as ClassArmColumn, Entity as ClassArm, Model as ClassArmModel};
pub use class_level::{
    Column as ClassLevelColumn, Entity as ClassLevel, Model as ClassLevelModel,
};
pub use enrollment::{
    Column as EnrollmentColumn, Entity as Enrollment, Model as EnrollmentModel,
};
pub use grade::{Column as GradeColumn, Entity as Grade, Model as GradeModel};
pub use student::{Column as StudentColumn, Entity as Student, Model as StudentModel};
pub use teacher::{Column as TeacherColumn, Entity as Teacher, Model as TeacherModel};
pub use term::{Column as TermColumn, Entity as Term, Model as TermModel};
pub use transfer::{
    Column as TransferColumn, Entity as Transfer, Model as TransferModel, TransferStatus,
};
