//! Shared test registry: a small HR model.

use crate::catalog::{ClassDef, ClassRegistry, DetailCollectionDef, EngineDef, PropertyDef, ViewDef};
use crate::metadata::Metadata;
use ormview_proto::ScalarType;

fn money() -> ScalarType {
    ScalarType::Decimal {
        precision: 12,
        scale: 2,
    }
}

pub(crate) fn hr_registry() -> ClassRegistry {
    ClassRegistry::new()
        .with_class(
            ClassDef::new("Hr.Person")
                .with_caption_property("Name")
                .with_loading_order(["Name", "BirthDate"])
                .with_properties([
                    PropertyDef::scalar("Name", ScalarType::String)
                        .not_null()
                        .with_caption("Full name")
                        .with_str_len(100),
                    PropertyDef::scalar("BirthDate", ScalarType::DateTime),
                ])
                .with_view(ViewDef::new("PersonL", ["Name"])),
        )
        .with_class(
            ClassDef::derived("Hr.Employee", "Hr.Person")
                .with_caption("Staff member")
                .with_loading_order(["Department", "Name"])
                .with_properties([
                    PropertyDef::master("Department", "Hr.Department").not_null(),
                    PropertyDef::master("Manager", "Hr.Employee"),
                    PropertyDef::master("Workplace", "Hr.Place")
                        .with_type_usage(["Hr.Office", "Hr.Plant"]),
                    PropertyDef::master("Site", "Hr.Place")
                        .with_type_usage(["Hr.Office", "Hr.Plant"])
                        .with_storage_names(["SiteOffice", "SitePlant"]),
                    PropertyDef::scalar("Salary", money()),
                    PropertyDef::scalar("Bonus", money()),
                    PropertyDef::scalar("TotalPay", money())
                        .not_stored()
                        .with_expression("Sql", "@Salary@ + @Bonus@")
                        .with_expression("MsSql", "ISNULL(@Salary@,0) + ISNULL(@Bonus@,0)"),
                    PropertyDef::detail("Skills", "Hr.SkillList"),
                ])
                .with_view(ViewDef::new("EmployeeL", ["Name", "Department.Title"]))
                .with_view(
                    ViewDef::new("EmployeeE", ["Name", "Department", "Salary"])
                        .with_detail("Skills", "SkillE")
                        .with_pseudo_detail("Hr.Department", "DepartmentL"),
                ),
        )
        .with_class(
            ClassDef::derived("Hr.Contractor", "Hr.Employee")
                .with_property(PropertyDef::scalar("Agency", ScalarType::String))
                .with_property_type_usage("Workplace", ["Hr.Office"]),
        )
        .with_class(
            ClassDef::new("Hr.Department")
                .with_storage_name("Departments")
                .with_primary_key_storage_name("DeptId")
                .with_key_type(ScalarType::Int64)
                .with_properties([
                    PropertyDef::scalar("Title", ScalarType::String).not_null(),
                    PropertyDef::master("Head", "Hr.Employee"),
                ])
                .with_view(ViewDef::new("DepartmentL", ["Title"])),
        )
        .with_class(
            ClassDef::new("Hr.Place")
                .not_stored()
                .with_property(PropertyDef::scalar("Address", ScalarType::String)),
        )
        .with_class(
            ClassDef::derived("Hr.Office", "Hr.Place")
                .with_property(PropertyDef::scalar("Floor", ScalarType::Int32)),
        )
        .with_class(
            ClassDef::derived("Hr.Plant", "Hr.Place")
                .with_property(PropertyDef::scalar("Capacity", ScalarType::Int32)),
        )
        .with_class(ClassDef::derived("Hr.Warehouse", "Hr.Place").with_storage_name("Plant"))
        .with_class(
            ClassDef::new("Hr.Skill")
                .with_properties([
                    PropertyDef::scalar("Title", ScalarType::String),
                    PropertyDef::scalar("Level", ScalarType::Int32),
                    PropertyDef::master("Owner", "Hr.Employee").not_null().aggregator(),
                    PropertyDef::scalar("Position", ScalarType::Int32).order(),
                ])
                .with_view(ViewDef::new("SkillE", ["Title", "Level"])),
        )
        .with_class(
            ClassDef::new("Hr.ParamsForm")
                .ephemeral()
                .with_property(PropertyDef::scalar("Limit", ScalarType::Int32)),
        )
        .with_collection(DetailCollectionDef::new("Hr.SkillList", "Hr.Skill"))
        .with_engine(EngineDef::new("Sql"))
        .with_engine(EngineDef::derived("MsSql", "Sql"))
        .with_engine(EngineDef::derived("PostgreSql", "Sql"))
        .with_engine(EngineDef::new("Oracle"))
}

pub(crate) fn hr_metadata() -> Metadata {
    Metadata::with_registry(hr_registry())
}
