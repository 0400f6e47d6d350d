//! Demo e-commerce database
//!
//! Four tables with declared foreign keys: customers, products, orders and
//! order_items. Seeding drops and recreates them, so it can be re-run on the
//! same file.

use crate::error::Result;
use rusqlite::{params, Connection};
use tracing::info;

const SCHEMA: &str = r#"
DROP TABLE IF EXISTS order_items;
DROP TABLE IF EXISTS orders;
DROP TABLE IF EXISTS products;
DROP TABLE IF EXISTS customers;

CREATE TABLE customers (
    customer_id INTEGER PRIMARY KEY,
    customer_name TEXT NOT NULL,
    email TEXT UNIQUE,
    city TEXT,
    country TEXT,
    registration_date DATE
);

CREATE TABLE products (
    product_id INTEGER PRIMARY KEY,
    product_name TEXT NOT NULL,
    category TEXT,
    price DECIMAL(10,2),
    stock_quantity INTEGER
);

CREATE TABLE orders (
    order_id INTEGER PRIMARY KEY,
    customer_id INTEGER,
    order_date DATE,
    total_amount DECIMAL(10,2),
    status TEXT,
    FOREIGN KEY (customer_id) REFERENCES customers (customer_id)
);

CREATE TABLE order_items (
    item_id INTEGER PRIMARY KEY,
    order_id INTEGER,
    product_id INTEGER,
    quantity INTEGER,
    unit_price DECIMAL(10,2),
    FOREIGN KEY (order_id) REFERENCES orders (order_id),
    FOREIGN KEY (product_id) REFERENCES products (product_id)
);
"#;

const CUSTOMERS: &[(i64, &str, &str, &str, &str, &str)] = &[
    (1, "John Smith", "john.smith@email.com", "New York", "USA", "2023-01-15"),
    (2, "Sarah Johnson", "sarah.j@email.com", "London", "UK", "2023-02-20"),
    (3, "Mike Chen", "mike.chen@email.com", "Toronto", "Canada", "2023-03-10"),
    (4, "Emily Davis", "emily.d@email.com", "Sydney", "Australia", "2023-04-05"),
    (5, "David Wilson", "david.w@email.com", "Berlin", "Germany", "2023-05-12"),
    (6, "Lisa Brown", "lisa.b@email.com", "Chicago", "USA", "2023-07-08"),
];

const PRODUCTS: &[(i64, &str, &str, f64, i64)] = &[
    (1, "Laptop Pro", "Electronics", 1299.99, 50),
    (2, "Wireless Headphones", "Electronics", 199.99, 100),
    (3, "Office Chair", "Furniture", 299.99, 25),
    (4, "Smartphone", "Electronics", 799.99, 75),
    (5, "Desk Lamp", "Furniture", 89.99, 40),
];

const ORDERS: &[(i64, i64, &str, f64, &str)] = &[
    (1, 1, "2023-06-01", 1499.98, "Completed"),
    (2, 2, "2023-06-02", 199.99, "Completed"),
    (3, 3, "2023-06-03", 1099.98, "Pending"),
    (4, 1, "2023-06-04", 89.99, "Completed"),
    (5, 4, "2023-06-05", 799.99, "Shipped"),
    (6, 6, "2023-07-15", 389.98, "Shipped"),
];

const ORDER_ITEMS: &[(i64, i64, i64, i64, f64)] = &[
    (1, 1, 1, 1, 1299.99),
    (2, 1, 2, 1, 199.99),
    (3, 2, 2, 1, 199.99),
    (4, 3, 1, 1, 1299.99),
    (5, 4, 5, 1, 89.99),
    (6, 5, 4, 1, 799.99),
    (7, 6, 3, 1, 299.99),
    (8, 6, 5, 1, 89.99),
];

/// Create the demo schema on `conn` and fill it with sample rows.
pub fn seed_sample_database(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(SCHEMA)?;

    {
        let mut insert = tx.prepare("INSERT INTO customers VALUES (?1, ?2, ?3, ?4, ?5, ?6)")?;
        for (id, name, email, city, country, registered) in CUSTOMERS {
            insert.execute(params![id, name, email, city, country, registered])?;
        }

        let mut insert = tx.prepare("INSERT INTO products VALUES (?1, ?2, ?3, ?4, ?5)")?;
        for (id, name, category, price, stock) in PRODUCTS {
            insert.execute(params![id, name, category, price, stock])?;
        }

        let mut insert = tx.prepare("INSERT INTO orders VALUES (?1, ?2, ?3, ?4, ?5)")?;
        for (id, customer, date, amount, status) in ORDERS {
            insert.execute(params![id, customer, date, amount, status])?;
        }

        let mut insert = tx.prepare("INSERT INTO order_items VALUES (?1, ?2, ?3, ?4, ?5)")?;
        for (id, order, product, quantity, price) in ORDER_ITEMS {
            insert.execute(params![id, order, product, quantity, price])?;
        }
    }

    tx.commit()?;
    info!(
        "Seeded sample database: {} customers, {} products, {} orders, {} order items",
        CUSTOMERS.len(),
        PRODUCTS.len(),
        ORDERS.len(),
        ORDER_ITEMS.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .expect("count")
    }

    #[test]
    fn test_seed_creates_rows() {
        let conn = Connection::open_in_memory().expect("open");
        seed_sample_database(&conn).expect("seed");
        assert_eq!(count(&conn, "customers"), CUSTOMERS.len() as i64);
        assert_eq!(count(&conn, "order_items"), ORDER_ITEMS.len() as i64);
    }

    #[test]
    fn test_seed_is_repeatable() {
        let conn = Connection::open_in_memory().expect("open");
        seed_sample_database(&conn).expect("first seed");
        seed_sample_database(&conn).expect("second seed");
        assert_eq!(count(&conn, "orders"), ORDERS.len() as i64);
    }
}
