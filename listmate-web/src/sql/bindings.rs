use std::fmt::{Display, Write};

/// The operator that should be used when comparing a field to a value
#[derive(Debug, Copy, Clone)]
pub enum BindingOperator {
    /// Simple equals
    Eq,
}

impl BindingOperator {
    fn write(&self, f: &mut std::fmt::Formatter<'_>, param: usize) -> std::fmt::Result {
        match self {
            BindingOperator::Eq => write!(f, "= ${param}"),
        }
    }
}

/// Generate a WHERE clause that uses query bindings when some or all of the filters may not be
/// present.
pub struct FilterBuilder<'a> {
    clauses: Vec<(&'a str, BindingOperator)>,
    first_parameter: usize,
}

impl<'a> FilterBuilder<'a> {
    /// Create a FilterBuilder, starting at the given parameter number
    pub fn new(first_parameter: usize) -> FilterBuilder<'a> {
        FilterBuilder {
            clauses: Vec::new(),
            first_parameter,
        }
    }

    /// Return true if no clauses were added
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Compare against an Option if it is `Some`
    pub fn add_option<T>(&mut self, field: &'a str, value: &Option<T>, operator: BindingOperator) {
        if value.is_none() {
            return;
        }

        self.clauses.push((field, operator));
    }
}

impl<'a> Display for FilterBuilder<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            // We need to write something, but don't have any conditions, so just "true" will
            // suffice. The query planner is smart enough to just ignore this.
            return f.write_str("true");
        }

        f.write_char('(')?;
        for (i, (field, operator)) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }

            let param = self.first_parameter + i;
            f.write_str(field)?;
            f.write_char(' ')?;
            operator.write(f, param)?;
        }
        f.write_char(')')?;

        Ok(())
    }
}

/// Generate the column list of an UPDATE ... SET statement for a partial update, where only
/// some of the fields may be present.
pub struct SetBuilder<'a> {
    columns: Vec<&'a str>,
    first_parameter: usize,
}

impl<'a> SetBuilder<'a> {
    /// Create a SetBuilder, starting at the given parameter number
    pub fn new(first_parameter: usize) -> SetBuilder<'a> {
        SetBuilder {
            columns: Vec::new(),
            first_parameter,
        }
    }

    /// Return true if no columns were added
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Set the column if the value is `Some`
    pub fn add_option<T>(&mut self, column: &'a str, value: &Option<T>) {
        if value.is_some() {
            self.columns.push(column);
        }
    }
}

impl<'a> Display for SetBuilder<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }

            write!(f, "{column} = ${}", self.first_parameter + i)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_filter_is_true() {
        let filters = FilterBuilder::new(2);
        assert_eq!(filters.to_string(), "true");
    }

    #[test]
    fn filters_number_parameters_in_order() {
        let mut filters = FilterBuilder::new(2);
        filters.add_option("t.status", &Some("DONE"), BindingOperator::Eq);
        filters.add_option("t.priority", &None::<&str>, BindingOperator::Eq);
        filters.add_option("t.due_date", &Some(1), BindingOperator::Eq);

        assert_eq!(filters.to_string(), "(t.status = $2 AND t.due_date = $3)");
    }

    #[test]
    fn set_builder_skips_missing_fields() {
        let mut set = SetBuilder::new(2);
        set.add_option("title", &Some("x"));
        set.add_option("description", &None::<String>);
        set.add_option("due_date", &Some(None::<i32>));

        assert!(!set.is_empty());
        assert_eq!(set.to_string(), "title = $2, due_date = $3");
    }

    #[test]
    fn empty_set_builder() {
        let set = SetBuilder::new(1);
        assert!(set.is_empty());
        assert_eq!(set.to_string(), "");
    }
}
