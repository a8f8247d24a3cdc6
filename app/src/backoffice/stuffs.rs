//! ABOUTME: Stuffs resource: list, detail, delete and export
//! ABOUTME: The status column is rendered as a tag and the owner links to the user

use crate::models::Stuff;
use bo_core::Result;
use bo_web::{
    export::fields,
    views::{DeleteView, DetailView, ExportView, ListView},
    ResourceViews,
};

pub fn resource() -> Result<ResourceViews> {
    Ok(ResourceViews::new("stuffs")
        .view(
            ListView::<Stuff>::new(fields(["id", "status", "owner"]))
                .paginate_by(15)
                .title("Stuffs")
                .build()?,
        )
        .view(
            DetailView::<Stuff>::new(fields([
                "id", "status", "owner", "price", "location", "picture", "report",
            ]))
            .build()?,
        )
        .view(DeleteView::<Stuff>::new())
        .view(
            ExportView::<Stuff>::new(
                fields([("status", "Status"), ("owner", "Owner"), ("price", "Price")]),
                "stuffs.csv",
            )
            .search_fields(&["owner_username"])
            .build()?,
        ))
}
